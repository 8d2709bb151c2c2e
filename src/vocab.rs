//! `psearch vocab`: inspect the loaded category and brand vocabulary.

use anyhow::{bail, Result};
use product_search_core::Vocabulary;

use crate::config::Config;
use crate::service;

pub fn list_vocabulary(config: &Config, category: Option<&str>) -> Result<()> {
    let vocabulary = service::load_vocabulary(config)?;
    print!("{}", render(&vocabulary, category)?);
    Ok(())
}

/// Render either the category table or one category's brands.
pub fn render(vocabulary: &Vocabulary, category: Option<&str>) -> Result<String> {
    let mut out = String::new();

    match category {
        Some(c) => {
            if !vocabulary.contains_category(c) {
                bail!("unknown category: {}", c);
            }
            for brand in vocabulary.brands_for(c) {
                out.push_str(brand);
                out.push('\n');
            }
        }
        None => {
            out.push_str(&format!("{:<28} {:<28} BRANDS\n", "CATEGORY", "LOCALIZED"));
            for entry in vocabulary.entries() {
                out.push_str(&format!(
                    "{:<28} {:<28} {}\n",
                    entry.canonical,
                    entry.localized,
                    vocabulary.brands_for(&entry.canonical).len()
                ));
            }
        }
    }

    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn vocab() -> Vocabulary {
        Vocabulary::from_json(
            r#"[["เครื่องมือช่าง", "hand tools"], ["สีทาบ้าน", "paint"]]"#,
            r#"{"เครื่องมือช่าง": ["Stanley", "Bosch"]}"#,
        )
        .unwrap()
    }

    #[test]
    fn test_render_table() {
        let out = render(&vocab(), None).unwrap();
        let lines: Vec<&str> = out.lines().collect();
        assert_eq!(lines.len(), 3);
        assert!(lines[1].starts_with("hand tools"));
        assert!(lines[1].trim_end().ends_with('2'));
        assert!(lines[2].trim_end().ends_with('0'));
    }

    #[test]
    fn test_render_brands() {
        assert_eq!(render(&vocab(), Some("hand tools")).unwrap(), "Stanley\nBosch\n");
        assert_eq!(render(&vocab(), Some("paint")).unwrap(), "");
        assert!(render(&vocab(), Some("garden")).is_err());
    }
}
