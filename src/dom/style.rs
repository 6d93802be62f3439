use indexmap::IndexMap;

/// One inline declaration
#[derive(Debug, Clone, PartialEq)]
struct Declaration {
    value: String,
    important: bool,
}

/// Inline style of an element (`element.style`).
///
/// Keeps declaration order so that `css_text` round-trips the way browsers serialize it.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct StyleDeclaration {
    declarations: IndexMap<String, Declaration>,
}

impl StyleDeclaration {
    pub fn new() -> Self {
        Self::default()
    }

    /// Parse a `cssText` string. Later declarations of a property win unless the
    /// earlier one is `!important` and the later one is not.
    pub fn parse(css_text: &str) -> Self {
        let mut style = Self::new();
        for chunk in css_text.split(';') {
            let Some((property, raw_value)) = chunk.split_once(':') else {
                continue;
            };
            let property = property.trim().to_ascii_lowercase();
            if property.is_empty() {
                continue;
            }

            let mut value = raw_value.trim().to_string();
            let important = value.to_ascii_lowercase().ends_with("!important");
            if important {
                value.truncate(value.len() - "!important".len());
                value = value.trim_end().to_string();
            }
            if value.is_empty() {
                continue;
            }

            if let Some(existing) = style.declarations.get(&property) {
                if existing.important && !important {
                    continue;
                }
            }
            style.declarations.insert(property, Declaration { value, important });
        }
        style
    }

    /// Value of a property, empty when unset
    pub fn get(&self, property: &str) -> String {
        self.declarations
            .get(property)
            .map(|d| d.value.clone())
            .unwrap_or_default()
    }

    pub fn is_important(&self, property: &str) -> bool {
        self.declarations.get(property).is_some_and(|d| d.important)
    }

    /// `style.setProperty(property, value)`; an empty value removes the property
    pub fn set(&mut self, property: &str, value: &str) {
        let property = property.trim().to_ascii_lowercase();
        if value.trim().is_empty() {
            self.declarations.shift_remove(&property);
            return;
        }
        match self.declarations.get_mut(&property) {
            Some(existing) => {
                existing.value = value.trim().to_string();
                existing.important = false;
            }
            None => {
                self.declarations.insert(
                    property,
                    Declaration { value: value.trim().to_string(), important: false },
                );
            }
        }
    }

    pub fn remove(&mut self, property: &str) {
        self.declarations.shift_remove(&property.to_ascii_lowercase());
    }

    pub fn is_empty(&self) -> bool {
        self.declarations.is_empty()
    }

    pub fn len(&self) -> usize {
        self.declarations.len()
    }

    /// Serialize as `cssText`
    pub fn css_text(&self) -> String {
        self.declarations
            .iter()
            .map(|(property, d)| {
                if d.important {
                    format!("{}: {} !important;", property, d.value)
                } else {
                    format!("{}: {};", property, d.value)
                }
            })
            .collect::<Vec<_>>()
            .join(" ")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_and_serialize() {
        let style = StyleDeclaration::parse("color: red; width:10px !important ;");
        assert_eq!(style.get("color"), "red");
        assert_eq!(style.get("width"), "10px");
        assert!(style.is_important("width"));
        assert_eq!(style.css_text(), "color: red; width: 10px !important;");
    }

    #[test]
    fn test_important_wins_over_later_plain() {
        let style = StyleDeclaration::parse("color: blue !important; color: red;");
        assert_eq!(style.get("color"), "blue");
    }

    #[test]
    fn test_set_and_remove() {
        let mut style = StyleDeclaration::new();
        style.set("background-color", "rgb(0, 0, 0)");
        style.set("padding", "4px");
        assert_eq!(style.len(), 2);

        style.set("padding", "");
        assert_eq!(style.get("padding"), "");
        style.remove("background-color");
        assert!(style.is_empty());
    }

    #[test]
    fn test_ignores_garbage() {
        let style = StyleDeclaration::parse("nonsense; : 3px; color:;  opacity: 0.5");
        assert_eq!(style.len(), 1);
        assert_eq!(style.get("opacity"), "0.5");
    }
}
