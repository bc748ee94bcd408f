//! Cross-module properties of the store.

use proptest::prelude::*;
use std::collections::{BTreeMap, BTreeSet};
use wikidb_core::{
    normalize_clause, BaseObject, ClassDefinition, CompareOp, Context, Document,
    DocumentReference, Lock, PropertyType, Query, StorageError, Value,
};
use wikidb_testkit::prelude::*;

proptest! {
    #![proptest_config(PropTestConfig::quick().to_proptest_config())]

    #[test]
    fn save_then_load_round_trips(
        space in space_strategy(),
        name in page_name_strategy(),
        content in plain_text_strategy(),
        values in prop::collection::vec(scalar_value_strategy(), 0..4),
    ) {
        let test_store = TestStore::memory();
        let ctx = test_store.ctx();
        let mut object = BaseObject::new("Test.DataClass", 0);
        for (i, value) in values.into_iter().enumerate() {
            object.set(format!("p{i}"), value);
        }
        let mut doc = page(&space, &name, &content).with_object(object);

        test_store.documents().save(&mut doc, &ctx).unwrap();
        let loaded = test_store.documents().load(&doc.reference, &ctx);
        prop_assert_eq!(loaded, Some(doc));
    }

    #[test]
    fn pages_cover_the_full_result(count in 0usize..20, page_size in 1usize..7) {
        let test_store = TestStore::memory();
        let ctx = test_store.ctx();
        for i in 0..count {
            let mut doc = page("Main", &format!("Doc{i:02}"), "");
            test_store.documents().save(&mut doc, &ctx).unwrap();
        }

        let base = Query::new("where doc.space = ? order by doc.name desc").bind("Main");
        let all = test_store.queries().search_names(&base, &ctx).unwrap();
        prop_assert_eq!(all.len(), count);
        prop_assert_eq!(test_store.queries().count(&base, &ctx).unwrap(), count);

        let mut paged = Vec::new();
        let mut offset = 0;
        loop {
            let chunk = test_store
                .queries()
                .search_names(&base.clone().offset(offset).limit(page_size), &ctx)
                .unwrap();
            prop_assert!(chunk.len() <= page_size);
            if chunk.is_empty() {
                break;
            }
            offset += chunk.len();
            paged.extend(chunk);
        }
        prop_assert_eq!(paged, all);
    }

    #[test]
    fn backlinks_track_churn(operations in churn_sequence_strategy(1, 30)) {
        let test_store = TestStore::memory();
        let ctx = test_store.ctx();
        let mut model: BTreeMap<String, BTreeSet<String>> = BTreeMap::new();

        for operation in &operations {
            match operation {
                ChurnOperation::Save { page: name, targets } => {
                    let content = targets
                        .iter()
                        .map(|t| format!("[[Main.{t}]]"))
                        .collect::<Vec<_>>()
                        .join(" ");
                    let mut doc = page("Main", name, &content);
                    test_store.documents().save(&mut doc, &ctx).unwrap();
                    model.insert(
                        name.clone(),
                        targets.iter().filter(|t| *t != name).cloned().collect(),
                    );
                }
                ChurnOperation::Delete { page: name } => {
                    test_store
                        .documents()
                        .delete(&reference("Main", name), &ctx)
                        .unwrap();
                    model.remove(name);
                }
            }
        }

        for i in 0..8 {
            let target = format!("P{i}");
            let expected: Vec<String> = model
                .iter()
                .filter(|(_, targets)| targets.contains(&target))
                .map(|(source, _)| format!("Main.{source}"))
                .collect();
            let actual = test_store
                .links()
                .backlinks(&reference("Main", &target), &ctx);
            prop_assert_eq!(actual, expected, "backlinks of {}", target);
        }
    }

    #[test]
    fn inline_and_positional_parameters_agree(
        names in prop::collection::btree_set(page_name_strategy(), 0..6),
        lower_bound in page_name_strategy(),
    ) {
        let test_store = TestStore::memory();
        let ctx = test_store.ctx();
        for name in &names {
            let mut doc = page("Main", name, "");
            test_store.documents().save(&mut doc, &ctx).unwrap();
        }

        let inline = Query::new(format!(
            "where doc.space = 'Main' and doc.name >= '{lower_bound}' order by doc.name"
        ));
        let positional = Query::new("where doc.space = ? and doc.name >= ? order by doc.name")
            .bind("Main")
            .bind(lower_bound.as_str());
        let (normalized, values) = normalize_clause(inline.clause(), &[]).unwrap();
        let normalized = Query::new(normalized).bind_all(values);

        let queries = test_store.queries();
        let expected = queries.search_names(&inline, &ctx).unwrap();
        prop_assert_eq!(&queries.search_names(&positional, &ctx).unwrap(), &expected);
        prop_assert_eq!(&queries.search_names(&normalized, &ctx).unwrap(), &expected);
        prop_assert_eq!(
            expected.len(),
            names.iter().filter(|n| n.as_str() >= lower_bound.as_str()).count()
        );
    }
}

#[test]
fn delete_cascades_to_lock_and_links() {
    let test_store = TestStore::memory();
    let ctx = test_store.ctx();
    let mut doc = page("Main", "A", "[[B]] [[Sandbox.C]]");
    test_store.documents().save(&mut doc, &ctx).unwrap();
    test_store
        .locks()
        .save(&Lock::for_document(&doc.reference, "XWiki.Admin"))
        .unwrap();

    test_store.documents().delete(&doc.reference, &ctx).unwrap();

    assert!(test_store.documents().load(&doc.reference, &ctx).is_none());
    assert!(test_store.locks().load(doc.id()).is_none());
    assert!(test_store.links().links(doc.id()).is_empty());
    assert!(test_store
        .links()
        .backlinks(&reference("Main", "B"), &ctx)
        .is_empty());
    assert_eq!(test_store.stats().unwrap().links, 0);
}

#[test]
fn cascade_inside_caller_transaction_is_all_or_nothing() {
    let test_store = TestStore::memory();
    let ctx = test_store.ctx();
    let mut doc = page("Main", "A", "[[B]]");
    test_store.documents().save(&mut doc, &ctx).unwrap();
    test_store
        .locks()
        .save(&Lock::for_document(&doc.reference, "XWiki.Admin"))
        .unwrap();

    let result: Result<(), StorageError> = test_store.transaction(|txn| {
        test_store.documents().delete_in(txn, &doc.reference, &ctx)?;
        Err(StorageError::invalid_operation("rolled back"))
    });
    assert!(result.is_err());

    assert!(test_store.documents().exists(&doc.reference, &ctx));
    assert!(test_store.locks().load(doc.id()).is_some());
    assert_eq!(test_store.links().links(doc.id()).len(), 1);
}

#[test]
fn lock_lifecycle() {
    let test_store = TestStore::memory();
    let id = reference("Main", "A").id();
    let locks = test_store.locks();

    assert!(locks.load(id).is_none());
    locks.save(&Lock::new(id, "XWiki.Alice")).unwrap();
    assert_eq!(locks.load(id).unwrap().owner, "XWiki.Alice");

    locks.save(&Lock::new(id, "XWiki.Bob")).unwrap();
    assert_eq!(locks.load(id).unwrap().owner, "XWiki.Bob");

    locks.delete(id).unwrap();
    assert!(locks.load(id).is_none());
    locks.delete(id).unwrap();
}

#[test]
fn mapping_validation() {
    let test_store = TestStore::memory();
    let ctx = test_store.ctx();
    let registry = test_store.mappings();
    let class = blog_post_class(None);

    assert!(registry.is_mapping_valid(&class, "category:string; rating:long"));
    for invalid in [
        "",
        "category",
        "category:blob",
        "missing:string",
        "category:string,category:text",
        "tags:string",
        "rating:boolean",
    ] {
        assert!(
            !registry.is_mapping_valid(&class, invalid),
            "{invalid:?} should be invalid"
        );
    }

    let mut class_doc = blog_post_class_document(Some("category:string,rating:integer"));
    test_store.documents().save(&mut class_doc, &ctx).unwrap();
    assert_eq!(
        registry.mapped_properties(WIKI, "Blog.PostClass"),
        vec!["category", "rating"]
    );

    let mut broken = blog_post_class_document(Some("tags:string"));
    let err = test_store.documents().save(&mut broken, &ctx).unwrap_err();
    assert!(matches!(err, StorageError::MappingMismatch { .. }));
    assert_eq!(
        registry.mapped_properties(WIKI, "Blog.PostClass"),
        vec!["category", "rating"]
    );

    let mut post = page("Blog", "Bad", "").with_object(
        BaseObject::new("Blog.PostClass", 0).with("rating", "five"),
    );
    assert!(test_store.documents().save(&mut post, &ctx).is_err());
}

#[test]
fn mapped_query_over_registered_class() {
    let test_store = TestStore::memory();
    let ctx = test_store.ctx();
    let mut class_doc = blog_post_class_document(Some("category:string,rating:integer"));
    test_store.documents().save(&mut class_doc, &ctx).unwrap();
    for (name, category, rating) in [("A", "news", 2), ("B", "news", 5), ("C", "misc", 4)] {
        let mut post = blog_post(name, category, rating);
        test_store.documents().save(&mut post, &ctx).unwrap();
    }

    let query = Query::new("where Blog.PostClass.category = ? order by Blog.PostClass.rating desc")
        .bind("news")
        .custom_mapping(true);
    assert_eq!(
        test_store.queries().search_names(&query, &ctx).unwrap(),
        vec!["Blog.B", "Blog.A"]
    );

    let structured = Query::new("")
        .condition("Blog.PostClass.rating", CompareOp::Gt, 3)
        .custom_mapping(true);
    assert_eq!(test_store.queries().count(&structured, &ctx).unwrap(), 2);
}

#[test]
fn journal_replay_restores_state() {
    let test_store = TestStore::file();
    let ctx = test_store.ctx();
    let mut saved = Vec::new();
    for (name, content) in [("A", "[[B]]"), ("B", "[[A]] [[C]]"), ("C", "")] {
        let mut doc = page("Main", name, content);
        test_store.documents().save(&mut doc, &ctx).unwrap();
        saved.push(doc);
    }
    let mut translation =
        Document::new(reference("Main", "A").with_language("fr")).with_content("bonjour");
    test_store.documents().save(&mut translation, &ctx).unwrap();
    test_store
        .locks()
        .save(&Lock::for_document(&saved[1].reference, "XWiki.Admin"))
        .unwrap();
    test_store
        .documents()
        .delete(&saved[2].reference, &ctx)
        .unwrap();
    test_store.create_wiki("dev").unwrap();
    let before = test_store.stats().unwrap();

    let test_store = test_store.reopen();
    let ctx = test_store.ctx();
    assert_eq!(test_store.stats().unwrap(), before);
    assert_eq!(
        test_store.documents().load(&saved[0].reference, &ctx),
        Some(saved[0].clone())
    );
    assert!(!test_store.documents().exists(&saved[2].reference, &ctx));
    assert_eq!(
        test_store.documents().translation_list(&saved[0].reference, &ctx),
        vec!["fr"]
    );
    assert_eq!(
        test_store.links().backlinks(&reference("Main", "A"), &ctx),
        vec!["Main.B"]
    );
    assert!(test_store.locks().load(saved[1].id()).is_some());
    assert_eq!(test_store.wikis(), vec!["dev", "xwiki"]);
}

#[test]
fn failed_commit_changes_nothing() {
    let (test_store, faults) = TestStore::faulty();
    let ctx = test_store.ctx();
    let mut doc = page("Main", "A", "[[B]]");
    test_store.documents().save(&mut doc, &ctx).unwrap();
    let stats = test_store.stats().unwrap();

    faults.fail_appends(true);

    let mut edited = doc.clone();
    edited.content = "[[C]]".into();
    let err = test_store.documents().save(&mut edited, &ctx).unwrap_err();
    assert!(err.is_transient());
    assert_eq!(edited.revision, doc.revision);

    let err = test_store
        .documents()
        .delete(&doc.reference, &ctx)
        .unwrap_err();
    assert!(err.is_transient());

    let lock = Lock::for_document(&doc.reference, "XWiki.Admin");
    assert!(test_store.locks().save(&lock).is_err());

    assert_eq!(test_store.stats().unwrap(), stats);
    assert_eq!(test_store.documents().load(&doc.reference, &ctx), Some(doc.clone()));
    assert_eq!(
        test_store.links().backlinks(&reference("Main", "B"), &ctx),
        vec!["Main.A"]
    );
    assert!(test_store.locks().load(doc.id()).is_none());

    faults.heal();
    test_store.documents().save(&mut edited, &ctx).unwrap();
    assert_eq!(edited.revision, 2);
}

#[test]
fn query_errors_carry_context() {
    let test_store = TestStore::memory();
    let ctx = test_store.ctx();

    let err = test_store
        .queries()
        .search_names(&Query::new("where doc.name = ? and doc.space = ?").bind("A"), &ctx)
        .unwrap_err();
    assert!(matches!(
        err,
        StorageError::ParameterMismatch {
            expected: 2,
            actual: 1,
            ..
        }
    ));

    let err = test_store
        .queries()
        .search_names(&Query::new("where doc.name = ").bind_all(Vec::<Value>::new()), &ctx)
        .unwrap_err();
    assert_eq!(err.clause(), Some("where doc.name = "));
    assert_eq!(err.param_count(), Some(0));
    assert!(!err.is_transient());
}

#[test]
fn wikis_keep_pages_and_mappings_apart() {
    let test_store = TestStore::memory();
    test_store.create_wiki("dev").unwrap();
    let main = test_store.ctx();
    let dev = Context::new("dev");

    let mut main_class = blog_post_class_document(Some("category:string,rating:integer"));
    test_store.documents().save(&mut main_class, &main).unwrap();
    let mut dev_class = Document::new(DocumentReference::new("dev", "Blog", "PostClass"))
        .with_class(
            ClassDefinition::new("Blog.PostClass")
                .with_property("rating", PropertyType::String)
                .with_custom_mapping("rating:string"),
        );
    test_store.documents().save(&mut dev_class, &dev).unwrap();

    let mut dev_post = Document::new(DocumentReference::new("dev", "Blog", "P1"))
        .with_object(BaseObject::new("Blog.PostClass", 0).with("rating", "high"));
    test_store.documents().save(&mut dev_post, &dev).unwrap();
    let mut main_post = blog_post("P1", "news", 4);
    test_store.documents().save(&mut main_post, &main).unwrap();

    let query = Query::new("where Blog.PostClass.rating = ?")
        .bind("high")
        .custom_mapping(true);
    assert_eq!(
        test_store.queries().search_names(&query, &dev).unwrap(),
        vec!["Blog.P1"]
    );
    let rated = Query::new("where Blog.PostClass.rating = ?")
        .bind(4)
        .custom_mapping(true);
    assert_eq!(
        test_store.queries().search_names(&rated, &main).unwrap(),
        vec!["Blog.P1"]
    );
    assert!(test_store.queries().search_names(&rated, &dev).unwrap().is_empty());

    let all = Query::new("where doc.space = 'Blog' order by doc.name");
    let dev_docs = test_store.queries().search_documents(&all, &dev).unwrap();
    assert!(dev_docs.iter().all(|d| d.reference.wiki() == "dev"));
    assert_eq!(dev_docs.len(), 2);
    assert_eq!(test_store.queries().count(&all, &main).unwrap(), 2);

    assert_eq!(
        test_store.mappings().registered_classes(),
        vec!["dev:Blog.PostClass", "xwiki:Blog.PostClass"]
    );
    assert_eq!(test_store.documents().class_list(&dev), vec!["Blog.PostClass"]);
}
