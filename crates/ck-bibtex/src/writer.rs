//! Record serialization.

use crate::record::BibRecord;

/// Serialize a record as a BibTeX entry.
///
/// Field order is preserved. Values are wrapped in braces unless they are
/// plain integers; the text between the braces is written verbatim.
pub fn serialize(record: &BibRecord) -> String {
    let mut out = format!("@{}{{{},\n", record.entry_type.as_str(), record.cite_key);
    for field in record.fields() {
        out.push_str("  ");
        out.push_str(&field.name);
        out.push_str(" = ");
        if !field.value.is_empty() && field.value.chars().all(|c| c.is_ascii_digit()) {
            out.push_str(&field.value);
        } else {
            out.push('{');
            out.push_str(&field.value);
            out.push('}');
        }
        out.push_str(",\n");
    }
    out.push_str("}\n");
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{parse, EntryType};
    use proptest::prelude::*;

    #[test]
    fn writes_braced_and_numeric_values() {
        let mut record = BibRecord::new(EntryType::Article, "TD17");
        record.set("author", "Alin Tomescu and Srinivas Devadas");
        record.set("year", "2017");
        record.set("title", "{Catena}");

        assert_eq!(
            serialize(&record),
            "@article{TD17,\n  author = {Alin Tomescu and Srinivas Devadas},\n  year = 2017,\n  title = {{Catena}},\n}\n"
        );
    }

    #[test]
    fn written_record_parses_back() {
        let original = parse(
            br#"@misc{Key1, title = "Quoted {Title}", note = {50% off}, year = {2001}}"#,
        )
        .unwrap();
        let reparsed = parse(serialize(&original).as_bytes()).unwrap();
        assert_eq!(reparsed, original);
    }

    #[test]
    fn quoted_value_with_braces_parses_back() {
        let original = parse(br#"@misc{K1, title = "a {b} \} c", note = "{"}"}"#).unwrap();
        assert_eq!(original.get("title"), Some("a {b} \\} c"));
        let reparsed = parse(serialize(&original).as_bytes()).unwrap();
        assert_eq!(reparsed, original);
    }

    proptest! {
        /// Whatever a metadata file can hold, writing it out must not make
        /// it unreadable.
        #[test]
        fn accepted_values_survive_rewrite(value in r#"[a-z0-9 {}"\\#%@,=]{0,16}"#) {
            for input in [
                format!("@misc{{K1, title = {{{value}}}}}"),
                format!("@misc{{K1, title = \"{value}\"}}"),
            ] {
                if let Ok(record) = parse(input.as_bytes()) {
                    let written = serialize(&record);
                    prop_assert_eq!(parse(written.as_bytes()), Ok(record), "{}", written);
                }
            }
        }
    }
}
