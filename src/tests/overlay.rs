use std::io::{Cursor, Write};
use std::path::PathBuf;

use crate::{
    errors::Error,
    formatting::OutputFormat,
    parser::ShefParser,
};

fn write_shefparm(tag: &str, content: &str) -> PathBuf {
    let mut path = std::env::temp_dir();
    path.push(format!("shefparm-{}-{}", std::process::id(), tag));
    let mut file = std::fs::File::create(&path).unwrap();
    file.write_all(content.as_bytes()).unwrap();
    path
}

#[test]
fn send_code_overlay_resolves_parameter() {
    let path = write_shefparm("send", "*6\nPP PPD\n");
    let mut parser = ShefParser::new(OutputFormat::Text1, Some(&path), true, false).unwrap();
    parser.set_input_reader(
        "<test>",
        Box::new(Cursor::new(".A LOC 20240501 Z/PP 0.5\n".to_string())),
    );
    let mut records = Vec::new();
    let mut lines = Vec::new();
    parser
        .parse_records(|parser, record| {
            lines.push(record.render(OutputFormat::Text1, parser.tables())?);
            records.push(record);
            Ok(())
        })
        .unwrap();
    std::fs::remove_file(&path).ok();

    assert_eq!(records.len(), 1);
    assert_eq!(records[0].parameter_code.as_str(), "PPDRZZZ");
    assert_eq!(records[0].value, 0.5);
    // the send-code display keeps six characters plus a space
    assert!(lines[0].contains("  PPDRZZ     "));
}

#[test]
fn overlay_max_errors_aborts_run() {
    let path = write_shefparm("maxerr", "**\n   2\n");
    let mut parser = ShefParser::new(OutputFormat::Text1, Some(&path), true, false).unwrap();
    assert_eq!(parser.tables().max_error_count(), 2);
    // three invalid dot-lines produce three errors; the third trips the cap
    parser.set_input_reader(
        "<test>",
        Box::new(Cursor::new(".X one\n.X two\n.X three\n".to_string())),
    );
    let result = parser.parse_records(|_, _| Ok(()));
    std::fs::remove_file(&path).ok();
    assert!(matches!(result, Err(Error::MaxErrorsExceeded(2))));
}

#[test]
fn missing_shefparm_is_critical() {
    let result = ShefParser::new(
        OutputFormat::Text1,
        Some(std::path::Path::new("/no/such/SHEFPARM")),
        false,
        false,
    );
    assert!(matches!(result, Err(Error::Config(_))));
}

#[test]
fn disabled_ts_code_rejects_parameters() {
    let path = write_shefparm("ts", "*3\nRZ\n");
    let mut parser = ShefParser::new(OutputFormat::Text1, Some(&path), true, false).unwrap();
    parser.set_input_reader(
        "<test>",
        Box::new(Cursor::new(".A LOC 20240501 Z DH12/HG 1.5\n".to_string())),
    );
    let mut count = 0usize;
    parser
        .parse_records(|_, _| {
            count += 1;
            Ok(())
        })
        .unwrap();
    std::fs::remove_file(&path).ok();
    // HG resolves through type-and-source RZ, which the overlay disabled
    assert_eq!(count, 0);
    assert_eq!(parser.diagnostics().error_count(), 1);
}
