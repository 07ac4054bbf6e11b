//! JSON Schema → regex compiler.
//!
//! Converts a JSON Schema document into a regex pattern matching exactly the
//! JSON text serializations the schema permits. The pattern then feeds the
//! regular pattern-to-DFA pipeline.
//!
//! Object properties are emitted in declaration order (the document's own
//! order, preserved by `serde_json`'s `preserve_order` feature); that order
//! is the canonical key order of the compiled pattern. Whitespace between
//! JSON tokens is optional everywhere.

use serde_json::Value;

use stencil_core::{GuideError, Result};

// JSON literal fragments
const WS: &str = r"[ \t\n\r]*";
const STRING_INNER: &str = r#"([^"\\\x00-\x1F]|\\["\\/bfnrt]|\\u[0-9a-fA-F]{4})"#;
const INTEGER: &str = r"(0|[1-9][0-9]*)";
const FRACTION_EXPONENT: &str = r"(\.[0-9]+)?([eE][+-]?[0-9]+)?";
const BOOLEAN: &str = "(true|false)";
const NULL: &str = "null";

/// Schemas nested (or `$ref`-expanded) deeper than this are rejected.
const MAX_SCHEMA_DEPTH: usize = 32;

/// Compile a JSON Schema document (as text) to a regex pattern.
pub fn compile_schema(schema_str: &str) -> Result<String> {
    let schema: Value = serde_json::from_str(schema_str)?;
    compile_schema_value(&schema)
}

/// Compile an already-parsed JSON Schema document to a regex pattern.
pub fn compile_schema_value(schema: &Value) -> Result<String> {
    let mut compiler = Compiler {
        root: schema,
        ref_stack: Vec::new(),
    };
    compiler.to_regex(schema, "#", 0)
}

fn unsupported(construct: impl Into<String>, path: &str) -> GuideError {
    GuideError::UnsupportedSchema {
        construct: construct.into(),
        path: path.to_string(),
    }
}

struct Compiler<'a> {
    root: &'a Value,
    /// `$ref` pointers on the active resolution path; a pointer appearing
    /// twice means the schema references itself and is rejected.
    ref_stack: Vec<String>,
}

impl<'a> Compiler<'a> {
    fn to_regex(&mut self, schema: &Value, path: &str, depth: usize) -> Result<String> {
        if depth > MAX_SCHEMA_DEPTH {
            return Err(unsupported(
                format!("schema nested deeper than {MAX_SCHEMA_DEPTH}"),
                path,
            ));
        }

        // Boolean schemas: `true` matches any JSON value, `false` nothing.
        if let Some(b) = schema.as_bool() {
            return if b {
                Ok(any_json_value())
            } else {
                Err(unsupported("false schema (rejects all values)", path))
            };
        }

        let obj = schema
            .as_object()
            .ok_or_else(|| unsupported("schema must be an object or boolean", path))?;

        if let Some(reference) = obj.get("$ref") {
            let pointer = reference
                .as_str()
                .ok_or_else(|| unsupported("non-string $ref", path))?;
            return self.resolve_ref(pointer, path, depth);
        }

        if let Some(enum_values) = obj.get("enum") {
            return enum_to_regex(enum_values, path);
        }

        if let Some(const_val) = obj.get("const") {
            return Ok(json_literal(const_val));
        }

        if let Some(variants) = obj.get("anyOf").or_else(|| obj.get("oneOf")) {
            return self.union_to_regex(variants, path, depth);
        }

        if obj.contains_key("allOf") {
            return Err(unsupported("allOf", path));
        }

        match obj.get("type") {
            Some(Value::String(t)) => self.typed_to_regex(obj, t, path, depth),
            // Union type lists: "type": ["string", "null"]
            Some(Value::Array(types)) => {
                let mut alternatives = Vec::with_capacity(types.len());
                for t in types {
                    let t = t
                        .as_str()
                        .ok_or_else(|| unsupported("non-string entry in type list", path))?;
                    alternatives.push(self.typed_to_regex(obj, t, path, depth)?);
                }
                Ok(format!("({})", alternatives.join("|")))
            }
            Some(_) => Err(unsupported("non-string type keyword", path)),
            // No type and no other recognized keyword: schema objects with
            // `properties` are treated as objects, anything else matches any
            // JSON value.
            None if obj.contains_key("properties") => self.object_to_regex(obj, path, depth),
            None => Ok(any_json_value()),
        }
    }

    fn typed_to_regex(
        &mut self,
        obj: &serde_json::Map<String, Value>,
        type_str: &str,
        path: &str,
        depth: usize,
    ) -> Result<String> {
        match type_str {
            "string" => string_to_regex(obj, path),
            "integer" => Ok(format!("{}{INTEGER}", sign_prefix(obj))),
            "number" => Ok(format!("{}{INTEGER}{FRACTION_EXPONENT}", sign_prefix(obj))),
            "boolean" => Ok(BOOLEAN.to_string()),
            "null" => Ok(NULL.to_string()),
            "object" => self.object_to_regex(obj, path, depth),
            "array" => self.array_to_regex(obj, path, depth),
            other => Err(unsupported(format!("type `{other}`"), path)),
        }
    }

    /// Resolve `#/definitions/...` or `#/$defs/...` pointers by substitution.
    /// A pointer already on the active resolution path is a recursive schema
    /// and is rejected rather than unrolled.
    fn resolve_ref(&mut self, pointer: &str, path: &str, depth: usize) -> Result<String> {
        let fragment = pointer
            .strip_prefix("#/")
            .ok_or_else(|| unsupported(format!("external $ref `{pointer}`"), path))?;

        if self.ref_stack.iter().any(|seen| seen == pointer) {
            return Err(unsupported(format!("recursive $ref `{pointer}`"), path));
        }

        let mut target = self.root;
        for segment in fragment.split('/') {
            target = target
                .get(segment)
                .ok_or_else(|| unsupported(format!("unresolvable $ref `{pointer}`"), path))?;
        }

        self.ref_stack.push(pointer.to_string());
        let result = self.to_regex(target, pointer, depth + 1);
        self.ref_stack.pop();
        result
    }

    fn union_to_regex(&mut self, variants: &Value, path: &str, depth: usize) -> Result<String> {
        let arr = variants
            .as_array()
            .ok_or_else(|| unsupported("anyOf/oneOf must be an array", path))?;
        if arr.is_empty() {
            return Err(unsupported("empty anyOf/oneOf", path));
        }

        let mut alternatives = Vec::with_capacity(arr.len());
        for (i, variant) in arr.iter().enumerate() {
            let sub_path = format!("{path}/anyOf/{i}");
            alternatives.push(self.to_regex(variant, &sub_path, depth + 1)?);
        }
        Ok(format!("({})", alternatives.join("|")))
    }

    /// Brace-delimited key/value sequence. Properties appear in declaration
    /// order; comma placement around optional properties follows the
    /// position of the last required property.
    fn object_to_regex(
        &mut self,
        obj: &serde_json::Map<String, Value>,
        path: &str,
        depth: usize,
    ) -> Result<String> {
        let required: Vec<&str> = obj
            .get("required")
            .and_then(|v| v.as_array())
            .map(|arr| arr.iter().filter_map(|v| v.as_str()).collect())
            .unwrap_or_default();

        let props = match obj.get("properties").and_then(|v| v.as_object()) {
            Some(props) if !props.is_empty() => props,
            _ => return Ok(format!(r"\{{{WS}\}}")),
        };

        let mut subpatterns = Vec::with_capacity(props.len());
        let mut is_required = Vec::with_capacity(props.len());
        for (key, value_schema) in props {
            let sub_path = format!("{path}/properties/{key}");
            let value_regex = self.to_regex(value_schema, &sub_path, depth + 1)?;
            subpatterns.push(format!(
                r#"{WS}"{}"{WS}:{WS}{value_regex}"#,
                regex_escape(key)
            ));
            is_required.push(required.contains(&key.as_str()));
        }

        let mut body = String::new();
        if let Some(last_required) = is_required.iter().rposition(|&r| r) {
            for (i, prop) in subpatterns.iter().enumerate() {
                match (i < last_required, is_required[i]) {
                    // Before the last required property, a present property
                    // always has a trailing comma.
                    (true, true) => body.push_str(&format!("{prop}{WS},")),
                    (true, false) => body.push_str(&format!("({prop}{WS},)?")),
                    (false, true) => body.push_str(prop),
                    // After the last required property the comma leads.
                    (false, false) => body.push_str(&format!("({WS},{prop})?")),
                }
            }
        } else {
            // Everything optional: alternate over which property appears
            // first, so commas separate exactly the present properties.
            let mut alternatives = Vec::with_capacity(subpatterns.len());
            for i in 0..subpatterns.len() {
                let mut alt = String::new();
                for prop in &subpatterns[..i] {
                    alt.push_str(&format!("({prop}{WS},)?"));
                }
                alt.push_str(&subpatterns[i]);
                for prop in &subpatterns[i + 1..] {
                    alt.push_str(&format!("({WS},{prop})?"));
                }
                alternatives.push(alt);
            }
            body.push_str(&format!("({})?", alternatives.join("|")));
        }

        Ok(format!(r"\{{{body}{WS}\}}"))
    }

    fn array_to_regex(
        &mut self,
        obj: &serde_json::Map<String, Value>,
        path: &str,
        depth: usize,
    ) -> Result<String> {
        let item = match obj.get("items") {
            Some(items) => self.to_regex(items, &format!("{path}/items"), depth + 1)?,
            None => any_json_value(),
        };

        let min_items = obj.get("minItems").and_then(|v| v.as_u64()).unwrap_or(0) as usize;
        let max_items = obj.get("maxItems").and_then(|v| v.as_u64()).map(|m| m as usize);

        if let Some(max) = max_items {
            if max < min_items {
                return Err(unsupported("maxItems smaller than minItems", path));
            }
        }

        let rest = |count: String| format!("({WS},{WS}{item}){count}");
        let required = |min: usize| {
            if min > 1 {
                rest(format!("{{{}}}", min - 1))
            } else {
                String::new()
            }
        };
        let body = match (min_items, max_items) {
            (0, None) => format!("({item}({WS},{WS}{item})*)?"),
            (0, Some(0)) => String::new(),
            (0, Some(max)) => format!("({item}{})?", rest(format!("{{0,{}}}", max - 1))),
            (min, None) => format!("{item}{}({WS},{WS}{item})*", required(min)),
            (min, Some(max)) => format!(
                "{item}{}{}",
                required(min),
                if max > min {
                    rest(format!("{{0,{}}}", max - min))
                } else {
                    String::new()
                }
            ),
        };

        Ok(format!(r"\[{WS}{body}{WS}\]"))
    }
}

/// Quoted-string pattern honoring `pattern`, `minLength`, `maxLength`.
fn string_to_regex(obj: &serde_json::Map<String, Value>, path: &str) -> Result<String> {
    if let Some(pattern) = obj.get("pattern").and_then(|v| v.as_str()) {
        // Validate the inner pattern compiles on its own, then wrap it in a
        // non-capturing group so it cannot break out of the quoted context.
        regex_automata::dfa::dense::DFA::new(pattern)
            .map_err(|e| unsupported(format!("invalid string pattern: {e}"), path))?;
        return Ok(format!(r#""(?:{pattern})""#));
    }

    let min_len = obj.get("minLength").and_then(|v| v.as_u64()).unwrap_or(0);
    let max_len = obj.get("maxLength").and_then(|v| v.as_u64());

    let quantifier = match (min_len, max_len) {
        (0, None) => "*".to_string(),
        (min, Some(max)) if min == max => format!("{{{min}}}"),
        (min, Some(max)) => {
            if max < min {
                return Err(unsupported("maxLength smaller than minLength", path));
            }
            format!("{{{min},{max}}}")
        }
        (min, None) => format!("{{{min},}}"),
    };

    Ok(format!(r#""{STRING_INNER}{quantifier}""#))
}

/// Sign prefix for numeric grammars. Only the sign of declared bounds is
/// expressible as a regex; tighter min/max constraints are approximated by
/// the unconstrained digit grammar.
fn sign_prefix(obj: &serde_json::Map<String, Value>) -> &'static str {
    let minimum = obj
        .get("minimum")
        .or_else(|| obj.get("exclusiveMinimum"))
        .and_then(|v| v.as_f64());
    let maximum = obj
        .get("maximum")
        .or_else(|| obj.get("exclusiveMaximum"))
        .and_then(|v| v.as_f64());

    match (minimum, maximum) {
        (Some(min), _) if min >= 0.0 => "",
        (_, Some(max)) if max < 0.0 => "-",
        _ => "-?",
    }
}

/// Alternation of the enum's literal JSON serializations.
fn enum_to_regex(values: &Value, path: &str) -> Result<String> {
    let arr = values
        .as_array()
        .ok_or_else(|| unsupported("enum must be an array", path))?;
    if arr.is_empty() {
        return Err(unsupported("empty enum", path));
    }

    let alternatives: Vec<String> = arr.iter().map(json_literal).collect();
    Ok(format!("({})", alternatives.join("|")))
}

/// The regex literal matching one JSON value's serialization.
fn json_literal(value: &Value) -> String {
    match value {
        Value::Null => NULL.to_string(),
        Value::Bool(true) => "true".to_string(),
        Value::Bool(false) => "false".to_string(),
        Value::Number(n) => regex_escape(&n.to_string()),
        Value::String(s) => format!(r#""{}""#, regex_escape(s)),
        Value::Array(arr) => {
            let elements: Vec<String> = arr.iter().map(json_literal).collect();
            format!(r"\[{WS}{}{WS}\]", elements.join(&format!("{WS},{WS}")))
        }
        Value::Object(obj) => {
            let entries: Vec<String> = obj
                .iter()
                .map(|(k, v)| format!(r#""{}"{WS}:{WS}{}"#, regex_escape(k), json_literal(v)))
                .collect();
            format!(r"\{{{WS}{}{WS}\}}", entries.join(&format!("{WS},{WS}")))
        }
    }
}

/// Pattern matching any JSON value (used for `true` and untyped schemas).
///
/// Approximate for containers: `\[.*\]` and `\{.*\}` accept any bracketed
/// content, not just well-formed JSON. Scalars are exact.
fn any_json_value() -> String {
    format!(
        r#"("{STRING_INNER}*"|-?{INTEGER}{FRACTION_EXPONENT}|{BOOLEAN}|{NULL}|\[.*\]|\{{.*\}})"#
    )
}

/// Escape regex metacharacters in a literal string.
fn regex_escape(s: &str) -> String {
    let mut escaped = String::with_capacity(s.len());
    for c in s.chars() {
        match c {
            '\\' | '.' | '+' | '*' | '?' | '(' | ')' | '|' | '[' | ']' | '{' | '}' | '^'
            | '$' => {
                escaped.push('\\');
                escaped.push(c);
            }
            _ => escaped.push(c),
        }
    }
    escaped
}
