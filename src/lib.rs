#![forbid(unsafe_code)]

//! Data-binding template expander for Adaptive Cards JSON.
//!
//! [`expand`] walks a template's JSON text, binds `$data`/`$root`/`$index`
//! against a separate data document, resolves every `${...}` placeholder
//! it finds, performs `$data`-driven array fan-out, and drops objects whose
//! `$when` predicate evaluates false — producing a single output JSON
//! string. See [`cst`] for the source parser, [`context`] for the binding
//! stack, [`expr`] for the embedded expression language, and [`visitor`]
//! for the tree walk that ties them together.

pub mod context;
pub mod cst;
pub mod error;
pub mod expr;
pub mod expressions;
pub mod result_buffer;
pub mod visitor;

use serde_json::Value;

use context::{ContextStack, DataContext};
pub use error::ExpandError;
use expr::{NullSubstitution, Options};

/// Expands `template_text` against `data_text`, using the default
/// null-substitution policy (an unresolved `${path}` re-emits itself
/// unchanged).
///
/// `data_text` may be empty: no root context is pushed, and every
/// `${expr}` in the template passes through untouched. `template_text`
/// must not be empty — there is no node for the visitor to walk.
pub fn expand(template_text: &str, data_text: &str) -> Result<String, ExpandError> {
    expand_with(template_text, data_text, &expr::default_null_substitution)
}

/// As [`expand`], but with a caller-supplied null-substitution policy
/// applied everywhere a `${path}` reference fails to resolve.
pub fn expand_with(
    template_text: &str,
    data_text: &str,
    null_substitution: &NullSubstitution<'_>,
) -> Result<String, ExpandError> {
    if template_text.is_empty() {
        return Err(ExpandError::InvalidArgument(
            "template_text must not be empty",
        ));
    }

    let doc = cst::parse_document(template_text);

    let mut stack = ContextStack::new();
    if !data_text.is_empty() {
        let root: Value = serde_json::from_str(data_text)?;
        stack.push(DataContext::from_value(root.clone(), root));
    }

    let opts = Options::new(null_substitution);
    let body = visitor::visit_node(&doc.root, &mut stack, &opts);

    debug_assert!(
        stack.is_empty(),
        "context stack must return to empty after a full expand()"
    );

    let rendered = if body.is_dropped() {
        String::new()
    } else {
        body.into_text()
    };
    Ok(format!("{}{}{}", doc.leading, rendered, doc.trailing))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn empty_template_is_rejected() {
        let err = expand("", "{}").unwrap_err();
        assert!(matches!(err, ExpandError::InvalidArgument(_)));
    }

    #[test]
    fn malformed_data_is_rejected() {
        let err = expand(r#"{"a":1}"#, "{not json").unwrap_err();
        assert!(matches!(err, ExpandError::MalformedData(_)));
    }

    #[test]
    fn empty_data_passes_placeholders_through() {
        let out = expand(r#"{"text":"${name}"}"#, "").unwrap();
        assert_eq!(out, r#"{"text":"${name}"}"#);
    }

    #[test]
    fn static_template_is_unchanged() {
        let template = r#"{ "a": 1, "b": [true, null, "x"] }"#;
        let out = expand(template, r#"{}"#).unwrap();
        assert_eq!(out, template);
    }

    #[test]
    fn substitutes_simple_field() {
        let out = expand(r#"{"text":"${name}"}"#, r#"{"name":"Matt"}"#).unwrap();
        assert_eq!(out, r#"{"text":"Matt"}"#);
    }

    #[test]
    fn non_string_value_elides_quotes() {
        let out = expand(r#"{"n":"${count}"}"#, r#"{"count":3}"#).unwrap();
        assert_eq!(out, r#"{"n":3}"#);
    }

    #[test]
    fn bare_template_root_elides_quotes_too() {
        let out = expand(r#"{"n":${count}}"#, r#"{"count":3}"#).unwrap();
        assert_eq!(out, r#"{"n":3}"#);
    }

    #[test]
    fn when_false_drops_the_object() {
        let template = r#"[{"$when":"${show}","text":"hi"}]"#;
        let out = expand(template, r#"{"show":false}"#).unwrap();
        assert_eq!(out, "[]");
    }

    #[test]
    fn when_true_keeps_the_object_and_renders_the_flag() {
        let template = r#"[{"$when":"${show}","text":"hi"}]"#;
        let out = expand(template, r#"{"show":true}"#).unwrap();
        assert_eq!(out, r#"[{"$when":true,"text":"hi"}]"#);
    }

    #[test]
    fn data_array_fans_out_the_bound_object() {
        let template = r#"{"$data":"${people}","text":"${name}"}"#;
        let data = json!({"people": [{"name": "A"}, {"name": "B"}]});
        let out = expand(template, &data.to_string()).unwrap();
        assert_eq!(out, r#"{"text":"A"},{"text":"B"}"#);
    }

    #[test]
    fn data_array_fan_out_inside_an_array_yields_n_items() {
        let template = r#"[{"$data":"${people}","text":"${name}"}]"#;
        let data = json!({"people": [{"name": "A"}, {"name": "B"}, {"name": "C"}]});
        let out = expand(template, &data.to_string()).unwrap();
        assert_eq!(out, r#"[{"text":"A"},{"text":"B"},{"text":"C"}]"#);
    }

    #[test]
    fn when_filters_fan_out_items() {
        let template = r#"[{"$data":"${people}","$when":"${include}","text":"${name}"}]"#;
        let data = json!({"people": [
            {"name": "A", "include": true},
            {"name": "B", "include": false},
            {"name": "C", "include": true},
        ]});
        let out = expand(template, &data.to_string()).unwrap();
        assert_eq!(
            out,
            r#"[{"$when":true,"text":"A"},{"$when":true,"text":"C"}]"#
        );
    }

    #[test]
    fn empty_bound_array_drops_the_item_entirely() {
        let template = r#"[{"$data":"${people}","text":"${name}"}]"#;
        let out = expand(template, r#"{"people": []}"#).unwrap();
        assert_eq!(out, "[]");
    }

    #[test]
    fn partial_template_string_stringifies_segments_in_place() {
        let out = expand(r#"{"text":"Count: ${n} items"}"#, r#"{"n":3}"#).unwrap();
        assert_eq!(out, r#"{"text":"Count: 3 items"}"#);
    }

    #[test]
    fn custom_null_substitution_is_applied() {
        let policy = |_path: &str| json!(null);
        let out = expand_with(r#"{"n":"${missing}"}"#, r#"{}"#, &policy).unwrap();
        assert_eq!(out, r#"{"n":null}"#);
    }

    #[test]
    fn broken_subtree_passes_through_verbatim() {
        let template = r#"{"a": !!!, "b": 2}"#;
        let out = expand(template, r#"{}"#).unwrap();
        assert_eq!(out, template);
    }

    #[test]
    fn dollar_root_reaches_outside_a_nested_data_binding() {
        let template = r#"{"$data":"${person}","who":"${name}","company":"${$root.company}"}"#;
        let data = json!({"person": {"name": "Matt"}, "company": "Acme"});
        let out = expand(template, &data.to_string()).unwrap();
        assert_eq!(out, r#"{"who":"Matt","company":"Acme"}"#);
    }

    #[test]
    fn index_is_available_inside_fan_out() {
        let template = r#"[{"$data":"${items}","i":${$index}}]"#;
        let data = json!({"items": ["x", "y"]});
        let out = expand(template, &data.to_string()).unwrap();
        assert_eq!(out, r#"[{"i":0},{"i":1}]"#);
    }
}
