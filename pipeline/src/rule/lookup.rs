use std::collections::HashMap;
use std::marker::PhantomData;

use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value;

use crate::event::Event;
use crate::path::{resolve_path, set_path};
use crate::rule::{Rule, RuleResult, RuleVariant};

/// One table row: field name → value to set under the target path.
pub type LookupTableEntry = HashMap<String, String>;

/// Key → row. The key is the string found at `source` in the serialized
/// event.
pub type LookupTable = HashMap<String, LookupTableEntry>;

/// Enriches one nested field from a table keyed by another nested field.
///
/// Serializes the event, reads the string at `source`, looks it up in
/// `table`, and — if found — sets `target.<field>` for every `(field,
/// value)` pair in the matching row, then deserializes the result back into
/// the event's content. A miss (key absent from the table, or the source
/// path itself missing) leaves the event unchanged. Reports `variant() ==
/// Transform`; it always returns `Transform { event: None }` because it
/// always mutates in place rather than replacing the event.
pub struct LookupRule<T> {
    table: LookupTable,
    source: String,
    target: String,
    _marker: PhantomData<fn() -> T>,
}

impl<T> LookupRule<T> {
    pub fn new(table: LookupTable, source: impl Into<String>, target: impl Into<String>) -> Self {
        Self {
            table,
            source: source.into(),
            target: target.into(),
            _marker: PhantomData,
        }
    }
}

impl<T> Rule<T> for LookupRule<T>
where
    T: Serialize + DeserializeOwned + Send + Sync,
{
    fn variant(&self) -> RuleVariant {
        RuleVariant::Transform
    }

    fn apply(&self, event: &mut Event<T>) -> RuleResult<T> {
        let Ok(data) = serde_json::to_value(event.content()) else {
            return RuleResult::Transform { event: None };
        };

        let key = resolve_path(&data, &self.source)
            .and_then(Value::as_str)
            .unwrap_or("");

        let Some(entry) = self.table.get(key) else {
            return RuleResult::Transform { event: None };
        };

        let mut enriched = data;
        for (field, value) in entry {
            let target_path = format!("{}.{}", self.target, field);
            if let Err(err) = set_path(&mut enriched, &target_path, Value::String(value.clone())) {
                tracing::warn!(path = %target_path, error = %err, "lookup rule failed to set field");
            }
        }

        match serde_json::from_value(enriched) {
            Ok(content) => event.set_content(content),
            Err(err) => {
                tracing::warn!(error = %err, "lookup rule failed to deserialize enriched content")
            }
        }

        RuleResult::Transform { event: None }
    }
}
