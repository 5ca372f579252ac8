//! End-to-end tests for xedi-pipeline: configuration files, grammar
//! overrides, rule-error files and both conversion directions

use pretty_assertions::assert_eq;
use std::io::Write;
use tempfile::{NamedTempFile, TempDir};
use xedi_ir::DiagnosticKind;
use xedi_pipeline::{
    ConversionContext, ConversionReport, ConverterConfig, EdiToXmlConverter, MarkBadProcessor,
    XmlToEdiConverter,
};

/// Purchase order and its acknowledgment in separate functional groups
const INTERCHANGE: &str = "\
ISA*00*          *00*          *ZZ*BUYER          *ZZ*SELLER         *230901*0815*U*00401*000001234*0*P*>~\
GS*PO*BUYER*SELLER*20230901*0815*1234*X*004010~\
ST*850*0001~\
BEG*00*SA*PO-7781**20230901~\
N1*ST*NORTH DC*92*0007~\
N3*12 DOCK RD~\
PO1*1*24*EA*3.10**BP*WID-1*VP*V-77~\
CTT*1~\
SE*7*0001~\
GE*1*1234~\
GS*PR*SELLER*BUYER*20230901*0820*1235*X*004010~\
ST*855*0001~\
BAK*00*AC*PO-7781*20230901~\
PO1*1*24*EA*3.10**BP*WID-1~\
SE*4*0001~\
GE*1*1235~\
IEA*2*000001234~";

fn write_file(dir: &TempDir, name: &str, content: &str) -> std::path::PathBuf {
    let path = dir.path().join(name);
    std::fs::write(&path, content).unwrap();
    path
}

fn config_file(content: &str) -> NamedTempFile {
    let mut file = NamedTempFile::new().unwrap();
    file.write_all(content.as_bytes()).unwrap();
    file
}

#[test]
fn test_config_file_drives_output_separators() -> anyhow::Result<()> {
    let file = config_file(
        "output:\n  segment_separator: '\\n'\n  element_separator: '|'\n  composite_separator: '^'\npretty_xml: false\n",
    );
    let config = ConverterConfig::from_file(file.path())?;

    let conversion = EdiToXmlConverter::new(&config).convert(INTERCHANGE)?;
    let xml = conversion.to_xml(config.pretty_xml);
    assert!(!xml.contains('\n'));

    let (text, diagnostics) = XmlToEdiConverter::from_config(&config)?.convert(&xml)?;
    assert!(diagnostics.is_empty(), "{diagnostics:?}");
    let lines: Vec<&str> = text.lines().collect();
    // The 855 is not a request document, so only its envelope survives
    assert_eq!(lines.len(), 13);
    assert!(lines[0].ends_with("|0|P|^"), "{}", lines[0]);
    assert_eq!(lines[6], "PO1|1|24|EA|3.10||BP|WID-1|VP|V-77");
    assert_eq!(lines[11], "GE|1|1235");
    assert_eq!(lines[12], "IEA|2|000001234");
    Ok(())
}

#[test]
fn test_response_set_needs_no_grammar_entry() -> anyhow::Result<()> {
    // 855 is not in the request grammar's transaction set list
    let conversion = EdiToXmlConverter::new(&ConverterConfig::default()).convert(INTERCHANGE)?;
    let report = conversion.report();
    assert_eq!(report.groups, 2);
    assert_eq!(report.transactions, 2);
    assert_eq!(report.bad_transactions, 1);
    assert_eq!(report.count(DiagnosticKind::TransactionParseFailed), 1);

    let response = ConverterConfig {
        direction: xedi_grammar::Direction::Response,
        ..ConverterConfig::default()
    };
    let conversion = EdiToXmlConverter::new(&response).convert(INTERCHANGE)?;
    assert_eq!(conversion.report().bad_transactions, 1);
    Ok(())
}

#[test]
fn test_grammar_path_overrides_builtin() -> anyhow::Result<()> {
    let dir = TempDir::new()?;
    write_file(
        &dir,
        "x12-004010-request.yaml",
        "name: x12-004010-request\nparent: x12-004010\ndirection: request\nstrict_segments: true\ntransaction_sets: [\"850\", \"855\"]\n",
    );
    let config = ConverterConfig {
        grammar_paths: vec![dir.path().to_path_buf()],
        ..ConverterConfig::default()
    };

    let conversion = EdiToXmlConverter::new(&config).convert(INTERCHANGE)?;
    // N3 is not declared anywhere, so the strict grammar rejects the 850;
    // the 855 now parses.
    let failure = conversion.diagnostics.iter().next().unwrap();
    assert_eq!(conversion.diagnostics.len(), 1);
    assert!(failure.message.contains("N3"), "{}", failure.message);
    assert_eq!(
        failure.path.as_deref(),
        Some("envelope(0).funcgroupContainer(1).funcgroup(0).transContainer(1).trans(0)")
    );
    Ok(())
}

#[test]
fn test_rule_error_file_marks_transaction() -> anyhow::Result<()> {
    let dir = TempDir::new()?;
    let location = write_file(
        &dir,
        "rule-errors.xml",
        "<Errors><ruleerrorcontainer><ruleerror>\
           <RULE_ID value=\"PO1-04\"/><MESSAGE value=\"unit price below floor\"/>\
           <CONTEXT value=\"/root/envelope[1]/funcgroupContainer/funcgroup[1]/transContainer/trans[1]/loopPO1[1]/iteration[1]/PO1[1]/PO104[1]\"/>\
         </ruleerror></ruleerrorcontainer></Errors>",
    );
    let config = ConverterConfig {
        rule_error_location: location.display().to_string(),
        ..ConverterConfig::default()
    };

    let conversion = EdiToXmlConverter::new(&config).convert(INTERCHANGE)?;
    let (marked, diagnostics) =
        MarkBadProcessor::from_config(&config).process(&conversion.document, &ConversionContext::new())?;
    assert!(diagnostics.is_empty(), "{diagnostics:?}");

    let report = ConversionReport::from_document("mark-bad", &marked, &diagnostics);
    // The 855 was already bad from parsing, the 850 is bad now
    assert_eq!(report.bad_transactions, 2);
    assert!(marked.exists(
        "envelope(0).funcgroupContainer(1).funcgroup(0).transContainer(1).badTransaction(0).BEG(1)"
    ));
    Ok(())
}

#[test]
fn test_report_json_lists_diagnostics() -> anyhow::Result<()> {
    let conversion = EdiToXmlConverter::new(&ConverterConfig::default()).convert(INTERCHANGE)?;
    let json: serde_json::Value = serde_json::from_str(&conversion.report().to_json()?)?;
    assert_eq!(json["interchange_control"], "000001234");
    assert_eq!(json["version"], "004010");
    assert_eq!(json["grammar"], "x12-004010-request");
    assert_eq!(json["diagnostics"][0]["kind"], "TransactionParseFailed");
    Ok(())
}
