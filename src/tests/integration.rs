//! Integration tests: the reference runtime end to end
//!
//! These tests build a small course tree:
//!   vertical (has children) -> html, problem
//! register it with a `BlockRuntime`, then drive children resolution,
//! XML export of the whole tree, and request handlers.

#[cfg(test)]
mod tests {
    use std::io::Write;
    use std::sync::Arc;

    use serde_json::json;

    use crate::config::{CoreConfig, UniqueIdPolicy};
    use crate::core::block::BlockError;
    use crate::core::block_type::BlockType;
    use crate::core::field::Field;
    use crate::core::registry::RegistryError;
    use crate::core::scope::Scope;
    use crate::core::storage::DictFieldData;
    use crate::core::value::FieldValue;
    use crate::mixins::{HandlersMixin, HierarchyMixin, ScopedStorageMixin, XmlSerializationMixin};
    use crate::request::{Request, Response};
    use crate::runtime::{BlockRuntime, Runtime};
    use crate::xml::{XmlElement, XmlNode};

    fn course_types() -> Vec<Arc<BlockType>> {
        let vertical = BlockType::builder("vertical")
            .has_children(true)
            .field("display_name", Field::string().scope(Scope::SETTINGS))
            .build()
            .unwrap();

        let html = BlockType::builder("html")
            .field("display_name", Field::string().scope(Scope::SETTINGS))
            .field("content", Field::string().default(""))
            .build()
            .unwrap();

        let problem = BlockType::builder("problem")
            .field("display_name", Field::string().scope(Scope::SETTINGS))
            .field("count", Field::integer().scope(Scope::USER_STATE).default(0i64))
            .handler("increment", |block, request| {
                let body = request
                    .json()
                    .map_err(|e| BlockError::ExecutionError(e.to_string()))?;
                let step = body["by"].as_i64().unwrap_or(1);
                let block = block.instance();
                let count = block.get("count")?.as_integer().unwrap_or(0) + step;
                block.set("count", count)?;
                Response::json(&json!({ "count": count }))
                    .map_err(|e| BlockError::ExecutionError(e.to_string()))
            })
            .build()
            .unwrap();

        vec![vertical, html, problem]
    }

    fn course_runtime(config: CoreConfig) -> Arc<BlockRuntime> {
        let runtime = BlockRuntime::with_config(Arc::new(DictFieldData::new()), config);
        for block_type in course_types() {
            runtime.register_type(block_type).unwrap();
        }
        runtime
    }

    #[test]
    fn test_children_resolve_through_runtime() {
        let runtime = course_runtime(CoreConfig::default());
        let unit_ids = runtime.create_usage("vertical", "student").unwrap();
        let html_ids = runtime.create_usage("html", "student").unwrap();
        let problem_ids = runtime.create_usage("problem", "student").unwrap();

        let unit = runtime.get_block(&unit_ids.usage_id).unwrap();
        unit.add_child(html_ids.usage_id.clone()).unwrap();
        unit.add_child(problem_ids.usage_id.clone()).unwrap();

        let children = unit.get_children().unwrap();
        let types: Vec<&str> = children.iter().map(|c| c.block_type().name()).collect();
        assert_eq!(types, vec!["html", "problem"]);
        assert_eq!(children[1].scope_ids(), &problem_ids);

        // Children are stored per definition, so a fresh instance sees them
        let again = runtime.get_block(&unit_ids.usage_id).unwrap();
        assert_eq!(again.children().unwrap().len(), 2);
    }

    #[test]
    fn test_export_tree() {
        let runtime = course_runtime(CoreConfig::default());
        let unit_ids = runtime.create_usage("vertical", "student").unwrap();
        let html_ids = runtime.create_usage("html", "student").unwrap();

        let unit = runtime.get_block(&unit_ids.usage_id).unwrap();
        unit.set("display_name", "Unit 1").unwrap();
        unit.add_child(html_ids.usage_id.clone()).unwrap();

        let html = runtime.get_block(&html_ids.usage_id).unwrap();
        html.set("display_name", "Intro").unwrap();
        html.set("content", "Hello").unwrap();

        let mut node = XmlElement::new("vertical");
        unit.add_xml_to_node(&mut node).unwrap();

        assert_eq!(
            node.to_xml_string().unwrap(),
            concat!(
                r#"<vertical xblock-family="xblock.v1" display_name="Unit 1">"#,
                r#"<html xblock-family="xblock.v1" display_name="Intro">Hello</html>"#,
                r#"</vertical>"#
            )
        );
    }

    #[test]
    fn test_export_rejects_self_child() {
        let runtime = course_runtime(CoreConfig::default());
        let unit_ids = runtime.create_usage("vertical", "student").unwrap();
        let unit = runtime.get_block(&unit_ids.usage_id).unwrap();
        unit.add_child(unit_ids.usage_id.clone()).unwrap();

        let mut node = XmlElement::new("vertical");
        assert!(matches!(
            unit.add_xml_to_node(&mut node),
            Err(BlockError::ChildCycle(id)) if id == unit_ids.usage_id
        ));
    }

    #[test]
    fn test_export_rejects_indirect_cycle() {
        let runtime = course_runtime(CoreConfig::default());
        let outer_ids = runtime.create_usage("vertical", "student").unwrap();
        let inner_ids = runtime.create_usage("vertical", "student").unwrap();
        let outer = runtime.get_block(&outer_ids.usage_id).unwrap();
        let inner = runtime.get_block(&inner_ids.usage_id).unwrap();
        outer.add_child(inner_ids.usage_id.clone()).unwrap();
        inner.add_child(outer_ids.usage_id.clone()).unwrap();

        let mut node = XmlElement::new("vertical");
        assert!(matches!(
            outer.add_xml_to_node(&mut node),
            Err(BlockError::ChildCycle(id)) if id == outer_ids.usage_id
        ));
        assert!(matches!(
            inner.add_children_to_node(&mut XmlElement::new("vertical")),
            Err(BlockError::ChildCycle(id)) if id == inner_ids.usage_id
        ));
    }

    /// The same child under two parents is not a cycle
    #[test]
    fn test_export_shared_child() {
        let runtime = course_runtime(CoreConfig::default());
        let unit_ids = runtime.create_usage("vertical", "student").unwrap();
        let left_ids = runtime.create_usage("vertical", "student").unwrap();
        let right_ids = runtime.create_usage("vertical", "student").unwrap();
        let html_ids = runtime.create_usage("html", "student").unwrap();

        let unit = runtime.get_block(&unit_ids.usage_id).unwrap();
        unit.add_child(left_ids.usage_id.clone()).unwrap();
        unit.add_child(right_ids.usage_id.clone()).unwrap();
        for ids in [&left_ids, &right_ids] {
            let side = runtime.get_block(&ids.usage_id).unwrap();
            side.add_child(html_ids.usage_id.clone()).unwrap();
        }

        let mut node = XmlElement::new("vertical");
        unit.add_xml_to_node(&mut node).unwrap();
        let leaves: Vec<&str> = node
            .children()
            .iter()
            .flat_map(|side| side.children())
            .map(|leaf| leaf.tag())
            .collect();
        assert_eq!(leaves, vec!["html", "html"]);
    }

    /// Exported XML loads back into a fresh definition
    #[test]
    fn test_export_then_import() {
        let runtime = course_runtime(CoreConfig::default());
        let source_ids = runtime.create_usage("html", "author").unwrap();
        let source = runtime.get_block(&source_ids.usage_id).unwrap();
        source.set("display_name", "Syllabus").unwrap();
        source.set("content", "Week 1 & 2").unwrap();

        let mut node = XmlElement::new("html");
        source.add_xml_to_node(&mut node).unwrap();
        let parsed = XmlElement::parse(&node.to_xml_string().unwrap()).unwrap();
        assert_eq!(parsed.tag(), "html");

        let target_ids = runtime.create_usage("html", "author").unwrap();
        let target = runtime.get_block(&target_ids.usage_id).unwrap();
        assert!(target.apply_xml_attributes(&parsed).unwrap().is_empty());

        assert_eq!(
            target.explicitly_set_values().unwrap(),
            source.explicitly_set_values().unwrap()
        );
    }

    #[test]
    fn test_handler_dispatch() {
        let runtime = course_runtime(CoreConfig::default());
        let ids = runtime.create_usage("problem", "student").unwrap();
        let problem = runtime.get_block(&ids.usage_id).unwrap();

        let request = Request::new("POST", "/handler/increment")
            .with_header("Content-Type", "application/json")
            .with_body(r#"{"by": 2}"#);
        let response = problem.handle("increment", &request).unwrap();

        assert_eq!(response.status, 200);
        assert_eq!(response.content_type, "application/json");
        let body: serde_json::Value = serde_json::from_slice(&response.body).unwrap();
        assert_eq!(body, json!({ "count": 2 }));
        assert_eq!(problem.get("count").unwrap(), FieldValue::Integer(2));

        assert!(matches!(
            problem.handle("reset", &request),
            Err(BlockError::NoSuchHandler(name)) if name == "reset"
        ));
    }

    /// User state written by a handler stays with that user
    #[test]
    fn test_handler_user_isolation() {
        let runtime = course_runtime(CoreConfig::default());
        let alice_ids = runtime.create_usage("problem", "alice").unwrap();
        let mut bob_ids = alice_ids.clone();
        bob_ids.user_id = "bob".into();
        bob_ids.usage_id = format!("{}-bob", alice_ids.usage_id);
        runtime.register_usage(bob_ids.clone());

        let request = Request::new("POST", "/").with_body("{}");
        let alice = runtime.get_block(&alice_ids.usage_id).unwrap();
        alice.handle("increment", &request).unwrap();
        alice.handle("increment", &request).unwrap();

        let bob = runtime.get_block(&bob_ids.usage_id).unwrap();
        assert_eq!(alice.get("count").unwrap(), FieldValue::Integer(2));
        assert_eq!(bob.get("count").unwrap(), FieldValue::Integer(0));
    }

    #[test]
    fn test_runtime_from_config_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "entry_point = \"xblock_asides.v1\"").unwrap();
        writeln!(file, "unique_ids = \"per_read\"").unwrap();
        let config = CoreConfig::load(file.path()).unwrap();

        let runtime = BlockRuntime::with_config(Arc::new(DictFieldData::new()), config);
        assert_eq!(runtime.unique_id_policy(), UniqueIdPolicy::PerRead);

        let xblock = BlockType::builder("html").build().unwrap();
        assert!(matches!(
            runtime.register_type(xblock),
            Err(RegistryError::FamilyMismatch { .. })
        ));

        let aside = BlockType::builder("thumbs")
            .entry_point("xblock_asides.v1")
            .build()
            .unwrap();
        runtime.register_type(aside).unwrap();
        assert_eq!(runtime.registry().types_in_family("xblock_asides.v1").len(), 1);
    }

    #[test]
    fn test_unknown_usage_and_type() {
        let runtime = course_runtime(CoreConfig::default());
        assert!(matches!(
            runtime.create_usage("video", "student"),
            Err(BlockError::UnknownBlockType(_))
        ));
        assert!(matches!(
            runtime.get_block("nowhere"),
            Err(BlockError::NoSuchBlock(_))
        ));
        assert_eq!(runtime.usage_count(), 0);
    }
}
