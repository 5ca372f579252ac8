//! Marking transaction sets of a converted interchange from rule-engine output

use pretty_assertions::assert_eq;
use xedi_adapter_x12::normalize::normalize;
use xedi_adapter_x12::{
    CoarseParser, EnvelopeSummary, ForwardIndexer, HeaderScanner, ParserRegistry,
    ReverseFlattener, parse_transaction_sets, reconstitute,
};
use xedi_grammar::{Direction, GrammarLoader};
use xedi_ir::{DiagnosticKind, XediDocument};
use xedi_validation::{BadTransactionMarker, RuleErrorCollection};

const INTERCHANGE: &str = "\
ISA*00*          *00*          *ZZ*SENDERID       *ZZ*RECEIVERID     *230615*1430*U*00401*000000321*0*P*>~\
GS*PO*SENDERID*RECEIVERID*20230615*1430*321*X*004010~\
ST*850*0001~BEG*00*SA*PO-1**20230615~REF*ZZ*BAD~PO1*1*2*EA*1.50**BP*A~SE*5*0001~\
ST*850*0002~BEG*00*SA*PO-2**20230615~PO1*1*4*EA*2.00**BP*B~SE*4*0002~\
GE*2*321~\
IEA*1*000000321~";

fn convert(raw: &str) -> anyhow::Result<XediDocument> {
    let delimiters = HeaderScanner::scan(raw)?;
    let mut skeleton = CoarseParser::new(delimiters.composite).parse(&normalize(raw, &delimiters)?)?;
    reconstitute(&mut skeleton);
    let parser = ParserRegistry::new(GrammarLoader::default(), Direction::Request)
        .resolve(&delimiters.version)?;
    let (tree, _) = parse_transaction_sets(&skeleton, parser.as_ref(), &delimiters);
    Ok(ForwardIndexer::new().index(&tree).0)
}

fn rule_errors(contexts: &[&str]) -> String {
    let entries: String = contexts
        .iter()
        .map(|c| {
            format!(
                "<ruleerror><RULE_ID value=\"REF01\"/><MESSAGE value=\"unknown qualifier\"/>\
                 <CONTEXT value=\"{c}\"/></ruleerror>"
            )
        })
        .collect();
    format!("<Errors><ruleerrorcontainer>{entries}</ruleerrorcontainer></Errors>")
}

#[test]
fn test_rule_error_marks_transaction_in_converted_document() -> anyhow::Result<()> {
    let doc = convert(INTERCHANGE)?;
    let errors = RuleErrorCollection::from_xml(&rule_errors(&[
        "/root/envelope[1]/funcgroupContainer/funcgroup[1]/transContainer/trans[1]/REF/REF01",
    ]))?;

    let (marked, diagnostics) = BadTransactionMarker::new().mark(&doc, &errors);
    assert!(diagnostics.is_empty(), "{diagnostics:?}");

    let summary = EnvelopeSummary::from_document(&marked);
    assert_eq!(summary.transaction_count(), 2);
    assert_eq!(summary.bad_transaction_count(), 1);

    let bad = "envelope(0).funcgroupContainer(1).funcgroup(0).transContainer(1).badTransaction(0)";
    assert_eq!(marked.get_value(&format!("{bad}.REF(2).REF02(1)"))?, Some("BAD"));

    let xml = xedi_ir::xml::to_xml(&marked, false);
    assert!(xml.contains("<badTransaction><ST><ST01 value=\"850\"/>"), "{xml}");
    assert!(xml.contains("<trans><ST><ST01 value=\"850\"/><ST02 value=\"0002\"/>"), "{xml}");
    Ok(())
}

#[test]
fn test_marked_document_still_flattens() -> anyhow::Result<()> {
    let doc = convert(INTERCHANGE)?;
    let errors = RuleErrorCollection::from_xml(&rule_errors(&[
        "/root/envelope[1]/funcgroupContainer/funcgroup[1]/transContainer/trans[2]/PO1",
    ]))?;
    let (marked, _) = BadTransactionMarker::new().mark(&doc, &errors);

    let (text, diagnostics) = ReverseFlattener::default().flatten(&marked);
    assert!(diagnostics.is_empty(), "{diagnostics:?}");
    assert!(text.contains("~ST*850*0002~BEG*00*SA*PO-2**20230615~"), "{text}");
    assert!(text.contains("~GE*2*321~"), "{text}");
    Ok(())
}

#[test]
fn test_bad_context_does_not_stop_other_errors() -> anyhow::Result<()> {
    let doc = convert(INTERCHANGE)?;
    let errors = RuleErrorCollection::from_xml(&rule_errors(&[
        "/root/envelope[1]/funcgroupContainer/funcgroup[one]/transContainer/trans[1]",
        "/root/envelope[1]/funcgroupContainer/funcgroup[1]/transContainer/trans[2]/SE",
    ]))?;
    let (marked, diagnostics) = BadTransactionMarker::new().mark(&doc, &errors);

    assert_eq!(diagnostics.len(), 1);
    assert_eq!(
        diagnostics.iter().next().map(|d| d.kind),
        Some(DiagnosticKind::BadTransactionPathResolutionFailed)
    );
    assert_eq!(EnvelopeSummary::from_document(&marked).bad_transaction_count(), 1);
    Ok(())
}
