//! Report rendering.

use std::io::Write;

use gsuite_directory::{Group, Report};

use crate::error::CliResult;

/// Header line of a group: `Name (email)` plus any aliases in brackets.
pub fn group_header(group: &Group) -> String {
    if group.aliases.is_empty() {
        format!("{} ({})", group.name, group.email)
    } else {
        format!(
            "{} ({}) [{}]",
            group.name,
            group.email,
            group.aliases.join(", ")
        )
    }
}

/// Writes each group header followed by its member list.
pub fn write_text<W: Write>(out: &mut W, report: &Report) -> CliResult<()> {
    for group in report {
        writeln!(out, "{}", group_header(group))?;
        writeln!(out, "[{}]", group.members.join(" "))?;
    }
    Ok(())
}

/// Writes the report as a pretty-printed JSON array.
pub fn write_json<W: Write>(out: &mut W, report: &Report) -> CliResult<()> {
    serde_json::to_writer_pretty(&mut *out, report)?;
    writeln!(out)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use gsuite_directory::GroupItem;

    fn report() -> Report {
        Report::new(vec![
            Group::from_item(
                GroupItem {
                    id: "00a".into(),
                    name: "Engineering".into(),
                    email: "eng@example.com".into(),
                    aliases: vec!["engineering@example.com".into(), "dev@example.com".into()],
                    ..Default::default()
                },
                vec!["alice@example.com".into(), "bob@example.com".into()],
            ),
            Group::from_item(
                GroupItem {
                    id: "00b".into(),
                    name: "Empty".into(),
                    email: "empty@example.com".into(),
                    ..Default::default()
                },
                Vec::new(),
            ),
        ])
    }

    #[test]
    fn test_write_text() {
        let mut out = Vec::new();
        write_text(&mut out, &report()).unwrap();

        assert_eq!(
            String::from_utf8(out).unwrap(),
            "Engineering (eng@example.com) [engineering@example.com, dev@example.com]\n\
             [alice@example.com bob@example.com]\n\
             Empty (empty@example.com)\n\
             []\n"
        );
    }

    #[test]
    fn test_write_json() {
        let mut out = Vec::new();
        write_json(&mut out, &report()).unwrap();

        let value: serde_json::Value = serde_json::from_slice(&out).unwrap();
        assert_eq!(value.as_array().unwrap().len(), 2);
        assert_eq!(value[0]["email"], "eng@example.com");
        assert_eq!(value[0]["members"][1], "bob@example.com");
        assert_eq!(value[1]["members"], serde_json::json!([]));
    }

    #[test]
    fn test_empty_report_prints_nothing() {
        let mut out = Vec::new();
        write_text(&mut out, &Report::default()).unwrap();
        assert!(out.is_empty());
    }
}
