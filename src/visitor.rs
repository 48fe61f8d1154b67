//! The template visitor — the engine proper.
//!
//! A pure tree walk over the [`crate::cst`] produced by the template source
//! parser: every node is either copied through verbatim or has its
//! `${...}` placeholders replaced, consulting the [`ContextStack`] for
//! `$data`/`$root`/`$index` bindings and the embedded expression evaluator
//! for `${...}` bodies. No node kind here performs I/O or holds state
//! across calls — the whole walk is single-threaded and strictly
//! sequential.

use serde_json::Value;

use crate::context::{ContextStack, DataContext, ScopeGuard};
use crate::cst::{ArrayNode, Node, ObjectNode, Pair, StringNode};
use crate::expr::{self, Options};
use crate::expressions::segment::Segment;
use crate::result_buffer::ResultBuffer;

/// Dispatches on node kind and returns the node's rendered output (or a
/// dropped, empty buffer for an object every one of whose fan-out
/// iterations failed its `$when`).
pub fn visit_node(node: &Node, stack: &mut ContextStack, opts: &Options) -> ResultBuffer {
    match node {
        Node::Object(o) => visit_object(o, stack, opts),
        Node::Array(a) => visit_array(a, stack, opts),
        Node::String(s) => visit_string(s, stack, opts),
        Node::TemplateRoot(expr_src) => {
            let fallback = format!("${{{expr_src}}}");
            visit_templated_value(expr_src, &fallback, stack, opts)
        }
        Node::Number(raw) => ResultBuffer::from_text(raw.clone()),
        Node::Bool(b) => ResultBuffer::from_text(if *b { "true" } else { "false" }),
        Node::Null => ResultBuffer::from_text("null"),
        // Parse-error subtree: pass the original source text through
        // unchanged and keep going.
        Node::Broken(raw) => ResultBuffer::from_text(raw.clone()),
    }
}

/// One rendered sibling in an object or array: either kept (carrying the
/// source-observed leading/trailing trivia and comma so the parent can
/// re-emit them) or dropped, in which case its trivia and comma are
/// discarded along with it.
enum Entry {
    Kept {
        leading: String,
        body: String,
        trailing: String,
        had_comma: bool,
    },
    Dropped,
}

/// Re-emits a sequence of sibling entries using each kept entry's own
/// source trivia, rather than synthesizing delimiters: a comma is emitted
/// after a kept entry only when that entry's source token was itself
/// followed by a comma *and* a later entry survived to receive it — which
/// also guarantees no trailing comma is produced when the original last
/// sibling was the one that got dropped.
fn join_entries(entries: &[Entry]) -> String {
    let kept_count = entries
        .iter()
        .filter(|e| matches!(e, Entry::Kept { .. }))
        .count();
    let mut out = String::new();
    let mut seen = 0;
    for entry in entries {
        let Entry::Kept {
            leading,
            body,
            trailing,
            had_comma,
        } = entry
        else {
            continue;
        };
        seen += 1;
        out.push_str(leading);
        out.push_str(body);
        out.push_str(trailing);
        if *had_comma && seen < kept_count {
            out.push(',');
        }
    }
    out
}

fn visit_array(a: &ArrayNode, stack: &mut ContextStack, opts: &Options) -> ResultBuffer {
    let entries: Vec<Entry> = a
        .items
        .iter()
        .map(|item| {
            let rendered = visit_node(&item.value, stack, opts);
            if rendered.is_dropped() {
                Entry::Dropped
            } else {
                Entry::Kept {
                    leading: item.leading.clone(),
                    body: rendered.into_text(),
                    trailing: item.trailing.clone(),
                    had_comma: item.had_comma,
                }
            }
        })
        .collect();
    ResultBuffer::from_text(format!("[{}]", join_entries(&entries)))
}

fn visit_object(o: &ObjectNode, stack: &mut ContextStack, opts: &Options) -> ResultBuffer {
    // The first `$data` pair (if any) wins; later ones are ignored.
    let data_idx = o.pairs.iter().position(|p| p.key == "$data");

    let derived = data_idx.and_then(|idx| {
        stack
            .peek()
            .and_then(|parent| derive_data_pair_context(&o.pairs[idx].value, parent, opts))
    });
    let array_fanout = derived.as_ref().is_some_and(DataContext::is_array);
    let len = derived.as_ref().map_or(0, DataContext::array_len);

    // The `$data` scope (if one was established) lives for the whole
    // object visit and is popped on every exit path — including the early
    // "zero iterations" case below — via this guard.
    let _data_guard = match derived {
        Some(dc) => ScopeGuard::push(stack, dc),
        None => ScopeGuard::none(stack),
    };

    let repeats = if array_fanout { len } else { 1 };

    // One pass per repetition.
    let mut iterations: Vec<(String, bool)> = Vec::with_capacity(repeats);
    for i in 0..repeats {
        let _index_guard = if array_fanout {
            let child = stack
                .peek()
                .expect("fan-out context present for array-kind $data")
                .derive_at_index(i);
            ScopeGuard::push(stack, child)
        } else {
            ScopeGuard::none(stack)
        };

        let (body, when_false) = visit_object_iteration(o, data_idx, stack, opts);
        iterations.push((body, when_false));
    }

    // An object is dropped only when every one of its iterations was —
    // including the degenerate `repeats == 0` case (an empty bound array
    // contributes zero instances, which is exactly "dropped" from the
    // parent's point of view).
    let kept: Vec<&str> = iterations
        .iter()
        .filter(|(_, dropped)| !dropped)
        .map(|(text, _)| text.as_str())
        .collect();

    if kept.is_empty() {
        ResultBuffer::dropped()
    } else {
        ResultBuffer::from_text(kept.join(","))
    }
}

/// Renders one fan-out iteration's `{ ... }` body, returning the rendered
/// text and whether this iteration's `$when` (if any) evaluated false.
fn visit_object_iteration(
    o: &ObjectNode,
    data_idx: Option<usize>,
    stack: &mut ContextStack,
    opts: &Options,
) -> (String, bool) {
    let mut any_when_false = false;
    let mut entries: Vec<Entry> = Vec::with_capacity(o.pairs.len());

    for (pi, pair) in o.pairs.iter().enumerate() {
        if Some(pi) == data_idx {
            continue;
        }
        if pair.key == "$when" {
            let keep = evaluate_when(&pair.value, stack, opts);
            if !keep {
                any_when_false = true;
            }
            entries.push(Entry::Kept {
                leading: pair.leading.clone(),
                body: render_pair(pair, if keep { "true" } else { "false" }),
                trailing: pair.trailing.clone(),
                had_comma: pair.had_comma,
            });
            continue;
        }

        let value = visit_node(&pair.value, stack, opts);
        if value.is_dropped() {
            // An object bound to this field dropped every one of its own
            // iterations; the whole field is omitted, the same way a
            // dropped array element is omitted.
            entries.push(Entry::Dropped);
            continue;
        }
        entries.push(Entry::Kept {
            leading: pair.leading.clone(),
            body: render_pair(pair, value.as_str()),
            trailing: pair.trailing.clone(),
            had_comma: pair.had_comma,
        });
    }

    let body = format!("{{{}}}", join_entries(&entries));
    (body, any_when_false)
}

fn render_pair(pair: &Pair, value_text: &str) -> String {
    format!(
        "{}{}:{}{}",
        pair.key_raw, pair.before_colon, pair.after_colon, value_text
    )
}

/// Evaluates a `$when` predicate against the current (already per-iteration,
/// post-fan-out) scope; a missing context, an unparsable predicate, a
/// failed evaluation, or a non-boolean result all default to "keep"
/// (`true`). This function only ever runs from inside
/// `visit_object_iteration`, which only runs after the per-index push for
/// an array-kind `$data` binding — so the scope it sees here is always the
/// per-element one, never the array itself.
fn evaluate_when(value: &Node, stack: &ContextStack, opts: &Options) -> bool {
    let expr_text = match expr_text_of(value) {
        Some(text) => text,
        None => return true,
    };
    let Some(dc) = stack.peek() else {
        return true;
    };
    let mem = dc.memory();
    let Ok(parsed) = expr::parse(&expr_text) else {
        return true;
    };
    match expr::evaluate(&parsed, &mem, opts) {
        Ok(Value::Bool(b)) => b,
        Ok(_) | Err(_) => true,
    }
}

/// Extracts the expression source text a `$data` or `$when` pair's value
/// should be evaluated as: a whole templated string's body, a bare
/// `${expr}` value's body, or — for a plain string with no `${...}` sugar
/// at all — the string's own text, treated as the expression source
/// directly.
fn expr_text_of(value: &Node) -> Option<String> {
    match value {
        Node::String(s) => Some(
            s.as_whole_expr()
                .map(str::to_string)
                .unwrap_or_else(|| segments_to_plain_text(&s.segments)),
        ),
        Node::TemplateRoot(e) => Some(e.clone()),
        _ => None,
    }
}

fn derive_data_pair_context(value: &Node, parent: &DataContext, opts: &Options) -> Option<DataContext> {
    match value {
        Node::Object(_) | Node::Array(_) => {
            Some(DataContext::from_value(node_to_json(value), parent.root().clone()))
        }
        Node::String(_) | Node::TemplateRoot(_) => {
            let expr_text = expr_text_of(value)?;
            parent.new_from_expression(&expr_text, opts)
        }
        _ => None,
    }
}

/// Converts an already-parsed CST subtree directly into a [`Value`] — used
/// only for an object/array *literal* bound via `$data`, which is meant to
/// be read as plain data, not expanded as a template.
fn node_to_json(node: &Node) -> Value {
    match node {
        Node::Object(o) => {
            let mut map = serde_json::Map::new();
            for p in &o.pairs {
                map.insert(p.key.clone(), node_to_json(&p.value));
            }
            Value::Object(map)
        }
        Node::Array(a) => Value::Array(a.items.iter().map(|i| node_to_json(&i.value)).collect()),
        Node::String(s) => Value::String(segments_to_plain_text(&s.segments)),
        Node::TemplateRoot(e) => Value::String(format!("${{{e}}}")),
        Node::Number(raw) => serde_json::from_str(raw).unwrap_or(Value::Null),
        Node::Bool(b) => Value::Bool(*b),
        Node::Null => Value::Null,
        Node::Broken(raw) => Value::String(raw.clone()),
    }
}

fn segments_to_plain_text(segments: &[Segment]) -> String {
    let mut s = String::new();
    for seg in segments {
        match seg {
            Segment::Literal(l) => s.push_str(l),
            Segment::Expr(e) => {
                s.push_str("${");
                s.push_str(e);
                s.push('}');
            }
        }
    }
    s
}

fn visit_string(s: &StringNode, stack: &mut ContextStack, opts: &Options) -> ResultBuffer {
    let has_expr = s.segments.iter().any(|seg| matches!(seg, Segment::Expr(_)));
    if !has_expr {
        // No `${...}` anywhere in this string: pass its original source
        // through untouched (this is what keeps a fully static template
        // byte-identical to its input).
        return ResultBuffer::from_text(s.raw.clone());
    }
    if let Some(expr_src) = s.as_whole_expr() {
        // On swallow, fall back to the original quoted token (`"${expr}"`),
        // not the bare `${expr}` text — this slot was always inside quotes
        // in the source, and losing them would hand back invalid JSON.
        return visit_templated_value(expr_src, &s.raw, stack, opts);
    }

    // Partially templated string: always quoted; each `${expr}` segment is
    // stringified in place without its own quotes, even when it evaluates
    // to a non-string value.
    let mut out = String::from("\"");
    for seg in &s.segments {
        match seg {
            Segment::Literal(lit) => out.push_str(&json_escape(lit)),
            Segment::Expr(e) => match eval_expr(e, stack, opts) {
                Some(v) => out.push_str(&stringify_for_embed(&v)),
                None => out.push_str(&format!("${{{e}}}")),
            },
        }
    }
    out.push('"');
    ResultBuffer::from_text(out)
}

/// Shared by a whole templated string (`"${expr}"`) and a bare `${expr}`
/// value outside quotes: the output is quoted only when the evaluated
/// value is itself a JSON string. On swallow, `fallback` is re-emitted
/// verbatim — the caller supplies the original source token (quotes
/// included, for a string slot; bare, for a TEMPLATEROOT), since this
/// function has no way to know which syntax produced `expr_src`.
fn visit_templated_value(
    expr_src: &str,
    fallback: &str,
    stack: &mut ContextStack,
    opts: &Options,
) -> ResultBuffer {
    match eval_expr(expr_src, stack, opts) {
        Some(Value::String(s)) => ResultBuffer::from_text(format!("\"{}\"", json_escape(&s))),
        Some(other) => ResultBuffer::from_text(
            serde_json::to_string(&other).unwrap_or_else(|_| "null".to_string()),
        ),
        // Any parse/eval failure (including "no context to evaluate
        // against") returns the original token unchanged.
        None => ResultBuffer::from_text(fallback.to_string()),
    }
}

/// Parses and evaluates `expr_src` against the current scope. Returns
/// `None` — meaning "swallow, fall back to the original placeholder text"
/// — when there's no bound context to evaluate against (an empty
/// `data_text` leaves every `${expr}` untouched), when the expression
/// fails to parse, or when evaluation errors (a type mismatch on a
/// comparison, say). An *unresolved path* is not a failure here: it is
/// handled inside `expr::evaluate` via the null-substitution policy and
/// still returns `Some`.
fn eval_expr(expr_src: &str, stack: &ContextStack, opts: &Options) -> Option<Value> {
    let dc = stack.peek()?;
    let mem = dc.memory();
    let parsed = expr::parse(expr_src).ok()?;
    expr::evaluate(&parsed, &mem, opts).ok()
}

fn stringify_for_embed(v: &Value) -> String {
    match v {
        Value::String(s) => json_escape(s),
        Value::Number(n) => n.to_string(),
        Value::Bool(b) => b.to_string(),
        Value::Null => "null".to_string(),
        other => serde_json::to_string(other).unwrap_or_default(),
    }
}

/// Escapes `s` for embedding as (or inside) a JSON string, reusing
/// `serde_json`'s own escaping rather than hand-rolling it.
fn json_escape(s: &str) -> String {
    let quoted = serde_json::to_string(s).expect("serde_json can always encode a &str");
    quoted[1..quoted.len() - 1].to_string()
}
