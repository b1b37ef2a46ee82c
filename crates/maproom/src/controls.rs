use foundation::ids::ElementId;
use foundation::value::Value;
use serde::Serialize;

use crate::error::DeclarationError;

/// `(label, value)` pairs offered by a month control.
pub const MONTHS: [(&str, &str); 12] = [
    ("January", "jan"),
    ("February", "feb"),
    ("March", "mar"),
    ("April", "apr"),
    ("May", "may"),
    ("June", "jun"),
    ("July", "jul"),
    ("August", "aug"),
    ("September", "sep"),
    ("October", "oct"),
    ("November", "nov"),
    ("December", "dec"),
];

/// Three-letter lowercase abbreviation for a month name or abbreviation.
pub fn normalize_month(raw: &str) -> Option<&'static str> {
    let raw = raw.trim();
    MONTHS
        .iter()
        .find(|(full, abbr)| full.eq_ignore_ascii_case(raw) || abbr.eq_ignore_ascii_case(raw))
        .map(|(_, abbr)| *abbr)
}

/// Bounds, step and default of a number control. Missing bounds leave the
/// control unbounded.
#[derive(Debug, Copy, Clone, PartialEq)]
pub struct NumberRange {
    pub min: Option<f64>,
    pub max: Option<f64>,
    pub step: f64,
    pub default: Option<f64>,
}

impl Default for NumberRange {
    fn default() -> Self {
        Self {
            min: None,
            max: None,
            step: 1.0,
            default: None,
        }
    }
}

impl NumberRange {
    pub fn between(min: f64, max: f64) -> Self {
        Self {
            min: Some(min),
            max: Some(max),
            ..Self::default()
        }
    }

    pub fn with_default(mut self, default: f64) -> Self {
        self.default = Some(default);
        self
    }

    pub fn with_step(mut self, step: f64) -> Self {
        self.step = step;
        self
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "widget", rename_all = "kebab-case")]
pub enum Widget {
    Month {
        default: &'static str,
    },
    Select {
        options: Vec<String>,
        default: String,
    },
    Number {
        min: Option<f64>,
        max: Option<f64>,
        step: f64,
        default: f64,
    },
    Text {
        default: String,
    },
}

/// An input widget with a validated default.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Control {
    pub id: ElementId,
    #[serde(flatten)]
    pub widget: Widget,
}

impl Control {
    pub fn month(id: impl Into<ElementId>, default: &str) -> Result<Self, DeclarationError> {
        let id = id.into();
        let Some(default) = normalize_month(default) else {
            return Err(DeclarationError::invalid_default(
                &id,
                format!("`{default}` is not a month name"),
            ));
        };
        Ok(Self {
            id,
            widget: Widget::Month { default },
        })
    }

    /// `default` falls back to the first option.
    pub fn select(id: impl Into<ElementId>, options: Vec<String>, default: Option<&str>) -> Result<Self, DeclarationError> {
        let id = id.into();
        let default = match (default, options.first()) {
            (_, None) => {
                return Err(DeclarationError::invalid_default(&id, "select has no options"));
            }
            (None, Some(first)) => first.clone(),
            (Some(d), Some(_)) if options.iter().any(|o| o == d) => d.to_string(),
            (Some(d), Some(_)) => {
                return Err(DeclarationError::invalid_default(
                    &id,
                    format!("`{d}` is not in the options list"),
                ));
            }
        };
        Ok(Self {
            id,
            widget: Widget::Select { options, default },
        })
    }

    pub fn number(id: impl Into<ElementId>, range: NumberRange) -> Result<Self, DeclarationError> {
        let id = id.into();
        let default = match (range.min, range.max) {
            (Some(min), Some(max)) if max < min => {
                return Err(DeclarationError::InvalidRange { id, min, max });
            }
            (Some(min), Some(max)) => match range.default {
                None => min,
                Some(d) if d < min || d > max => {
                    return Err(DeclarationError::invalid_default(
                        &id,
                        format!("{d} is outside [{min}, {max}]"),
                    ));
                }
                Some(d) => d,
            },
            _ => range.default.unwrap_or(0.0),
        };
        Ok(Self {
            id,
            widget: Widget::Number {
                min: range.min,
                max: range.max,
                step: range.step,
                default,
            },
        })
    }

    pub fn text(id: impl Into<ElementId>, default: &str) -> Self {
        Self {
            id: id.into(),
            widget: Widget::Text {
                default: default.to_string(),
            },
        }
    }

    pub fn default_value(&self) -> Value {
        match &self.widget {
            Widget::Month { default } => Value::from(*default),
            Widget::Select { default, .. } => Value::from(default.as_str()),
            Widget::Number { default, .. } => Value::Number(*default),
            Widget::Text { default } => Value::from(default.as_str()),
        }
    }

    /// Checks an incoming value against the widget and returns it in the
    /// form compute functions receive. Numbers may arrive as text.
    pub fn coerce(&self, value: Value) -> Result<Value, String> {
        match &self.widget {
            Widget::Month { .. } => {
                let raw = value.as_str().ok_or_else(|| format!("expected a month, got {}", value.type_name()))?;
                normalize_month(raw)
                    .map(Value::from)
                    .ok_or_else(|| format!("`{raw}` is not a month name"))
            }
            Widget::Select { options, .. } => {
                let raw = value.as_str().ok_or_else(|| format!("expected text, got {}", value.type_name()))?;
                if options.iter().any(|o| o == raw) {
                    Ok(value)
                } else {
                    Err(format!("`{raw}` is not one of the options"))
                }
            }
            Widget::Number { min, max, .. } => {
                let n = match &value {
                    Value::Number(n) => *n,
                    Value::Text(s) => s
                        .trim()
                        .parse::<f64>()
                        .map_err(|_| format!("`{s}` is not a number"))?,
                    other => return Err(format!("expected a number, got {}", other.type_name())),
                };
                if !n.is_finite() {
                    return Err(format!("{n} is not finite"));
                }
                if min.is_some_and(|min| n < min) || max.is_some_and(|max| n > max) {
                    return Err(format!("{n} is out of range"));
                }
                Ok(Value::Number(n))
            }
            Widget::Text { .. } => match value {
                Value::Text(_) => Ok(value),
                Value::Number(_) | Value::Bool(_) => Ok(Value::from(value.to_query_string())),
                other => Err(format!("expected text, got {}", other.type_name())),
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::{Control, NumberRange, Widget, normalize_month};
    use crate::error::DeclarationError;
    use foundation::value::Value;

    #[test]
    fn month_accepts_full_names() {
        assert_eq!(normalize_month("January"), Some("jan"));
        assert_eq!(normalize_month("SEP"), Some("sep"));
        assert_eq!(normalize_month("Smarch"), None);

        let c = Control::month("m0", "March").unwrap();
        assert_eq!(c.default_value(), Value::from("mar"));
        assert!(matches!(
            Control::month("m1", "foo"),
            Err(DeclarationError::InvalidDefault { .. })
        ));
    }

    #[test]
    fn select_defaults() {
        let opts = vec!["ABC".to_string(), "XYZ".to_string()];
        let c = Control::select("s0", opts.clone(), None).unwrap();
        assert_eq!(c.default_value(), Value::from("ABC"));
        let c = Control::select("s0", opts.clone(), Some("XYZ")).unwrap();
        assert_eq!(c.default_value(), Value::from("XYZ"));
        assert!(matches!(
            Control::select("s0", opts, Some("QQQ")),
            Err(DeclarationError::InvalidDefault { .. })
        ));
        assert!(matches!(
            Control::select("s0", vec![], None),
            Err(DeclarationError::InvalidDefault { .. })
        ));
    }

    #[test]
    fn number_bounds_and_defaults() {
        let c = Control::number("num0", NumberRange::between(0.0, 100.0).with_default(50.0)).unwrap();
        assert_eq!(c.default_value(), Value::Number(50.0));

        let c = Control::number("n", NumberRange::between(5.0, 10.0)).unwrap();
        assert_eq!(c.default_value(), Value::Number(5.0));

        let c = Control::number("n", NumberRange::default()).unwrap();
        assert_eq!(c.default_value(), Value::Number(0.0));
        assert!(matches!(c.widget, Widget::Number { step, .. } if step == 1.0));

        let open = NumberRange {
            min: Some(10.0),
            ..NumberRange::default()
        };
        let c = Control::number("n", open.with_default(-3.0)).unwrap();
        assert_eq!(c.default_value(), Value::Number(-3.0));

        assert!(matches!(
            Control::number("n", NumberRange::between(10.0, 0.0)),
            Err(DeclarationError::InvalidRange { .. })
        ));
        assert!(matches!(
            Control::number("n", NumberRange::between(0.0, 10.0).with_default(11.0)),
            Err(DeclarationError::InvalidDefault { .. })
        ));
    }

    #[test]
    fn coercion() {
        let num = Control::number("num0", NumberRange::between(0.0, 100.0)).unwrap();
        assert_eq!(num.coerce(Value::from("75")), Ok(Value::Number(75.0)));
        assert!(num.coerce(Value::Number(101.0)).is_err());
        assert!(num.coerce(Value::from("abc")).is_err());

        let mon = Control::month("m0", "jan").unwrap();
        assert_eq!(mon.coerce(Value::from("February")), Ok(Value::from("feb")));
        assert!(mon.coerce(Value::Number(2.0)).is_err());

        let text = Control::text("t1", "");
        assert_eq!(text.coerce(Value::Number(2.5)), Ok(Value::from("2.5")));
        assert_eq!(text.default_value(), Value::from(""));
    }
}
