//! Property tests for delimiter handling and element indexing

use proptest::prelude::*;
use xedi_adapter_x12::normalize::normalize_with;
use xedi_adapter_x12::syntax::synthetic_header;
use xedi_adapter_x12::{ForwardIndexer, HeaderScanner, ReverseFlattener, Separators, VisitorContext};
use xedi_ir::{GroupArity, NodeKind, ParseTree};

const PUNCTUATION: &[char] = &['*', '|', '^', '!', '+', '\\', '`', '#', '@', '~', ';', '>', '{', '$'];

/// One run of element groups, every group exactly `arity` elements long
fn group_run() -> impl Strategy<Value = (GroupArity, Vec<Vec<bool>>)> {
    prop_oneof![Just(GroupArity::Pair), Just(GroupArity::Triple)].prop_flat_map(|arity| {
        let group = prop::collection::vec(any::<bool>(), arity.size());
        (Just(arity), prop::collection::vec(group, 0..5))
    })
}

fn punctuation() -> impl Strategy<Value = char> {
    prop::sample::select(PUNCTUATION.to_vec())
}

/// Segment delimiters as partners actually send them
fn segment_delimiter() -> impl Strategy<Value = String> {
    prop_oneof![
        punctuation().prop_map(|c| c.to_string()),
        punctuation().prop_map(|c| format!("{c}\n")),
        punctuation().prop_map(|c| format!("{c}\r\n")),
        Just("\n".to_string()),
        Just("\r\n".to_string()),
    ]
}

/// Three separators no one of which can be mistaken for another
fn separators() -> impl Strategy<Value = Separators> {
    (punctuation(), punctuation(), segment_delimiter())
        .prop_filter("separators must be distinct", |(e, c, s)| {
            e != c && !s.contains(*e) && !s.contains(*c)
        })
        .prop_map(|(e, c, s)| Separators::new(e, c, s))
}

fn segments() -> impl Strategy<Value = Vec<(String, Vec<String>)>> {
    prop::collection::vec(
        ("[A-Z][A-Z0-9]{1,2}", prop::collection::vec("[A-Z0-9 ]{0,6}", 0..8)),
        0..10,
    )
}

fn render(separators: &Separators, segments: &[(String, Vec<String>)]) -> String {
    let mut out = String::new();
    for (tag, elements) in segments {
        out.push_str(tag);
        for element in elements {
            out.push(separators.element);
            out.push_str(element);
        }
        out.push_str(&separators.segment);
    }
    out.push_str(&format!("IEA{}1{}000000001", separators.element, separators.element));
    out.push_str(&separators.segment);
    out
}

proptest! {
    #[test]
    fn header_scan_recovers_separators(sep in separators(), version in "[0-9]{6}(X[0-9]{3}A1)?") {
        let header = synthetic_header(&sep, &version);
        let found = HeaderScanner::scan(&header).unwrap();
        prop_assert_eq!(found.element, sep.element);
        prop_assert_eq!(found.composite, sep.composite);
        prop_assert_eq!(&found.segment, &sep.segment);
        prop_assert_eq!(found.version, version);
    }

    #[test]
    fn normalization_round_trips(
        from in separators(),
        to in separators(),
        body in segments(),
    ) {
        let message = render(&from, &body);
        let there = normalize_with(&message, &from, &to).unwrap();
        let back = normalize_with(&there, &to, &from).unwrap();
        prop_assert_eq!(back, message);
    }

    #[test]
    fn ungrouped_index_counts_only_populated_elements(present in prop::collection::vec(any::<bool>(), 1..20)) {
        let mut ctx = VisitorContext::for_segment("SEG", "s");
        let mut written = 0;
        for (position, &populated) in present.iter().enumerate() {
            let path = ctx.enter_element(None, !populated).unwrap();
            if populated {
                let expected = format!("s.SEG{:02}({written})", position + 1);
                prop_assert_eq!(path.as_deref(), Some(expected.as_str()));
                written += 1;
            } else {
                prop_assert_eq!(path, None);
            }
        }
    }

    #[test]
    fn group_runs_index_against_surrounding_elements(
        lead in prop::collection::vec(any::<bool>(), 0..6),
        (arity, groups) in group_run(),
        trail in prop::collection::vec(any::<bool>(), 0..6),
    ) {
        let mut ctx = VisitorContext::for_segment("SEG", "s");
        let mut ordinal = 0;
        let mut empties = 0;

        for &populated in &lead {
            ordinal += 1;
            let path = ctx.enter_element(None, !populated).unwrap();
            if populated {
                let expected = format!("s.SEG{ordinal:02}({})", ordinal - empties - 1);
                prop_assert_eq!(path.as_deref(), Some(expected.as_str()));
            } else {
                empties += 1;
                prop_assert_eq!(path, None);
            }
        }

        // The container sits where the first grouped element would have
        let container = format!("{}({})", arity.container_name(), lead.len() - empties);
        let mut empty_in_groups = 0;
        for (count, group) in groups.iter().enumerate() {
            ctx.enter_element_group(arity);
            for (position, &populated) in group.iter().enumerate() {
                ordinal += 1;
                let path = ctx.enter_element(Some(arity), !populated).unwrap();
                if populated {
                    let index = count - empty_in_groups / arity.size();
                    let expected = format!(
                        "s.{container}.{}({index}).SEG{:02}({position})",
                        arity.group_name(),
                        lead.len() + 1 + position,
                    );
                    prop_assert_eq!(path.as_deref(), Some(expected.as_str()));
                } else {
                    empty_in_groups += 1;
                    prop_assert_eq!(path, None);
                }
            }
        }

        for &populated in &trail {
            ordinal += 1;
            let path = ctx.enter_element(None, !populated).unwrap();
            if populated {
                let expected = format!("s.SEG{ordinal:02}({})", ordinal - empties - 1);
                prop_assert_eq!(path.as_deref(), Some(expected.as_str()));
            } else {
                empties += 1;
                prop_assert_eq!(path, None);
            }
        }
    }

    #[test]
    fn skipped_elements_are_restored(values in prop::collection::vec("[A-Z0-9]{0,3}", 1..12)) {
        let mut tree = ParseTree::new();
        let envelope = tree.add(NodeKind::Envelope, "envelope");
        tree.set_root(envelope);
        let groups = tree.append(envelope, NodeKind::FuncGroupContainer, "");
        let group = tree.append(groups, NodeKind::FuncGroup, "");
        let transactions = tree.append(group, NodeKind::TransactionContainer, "");
        let trans = tree.append(transactions, NodeKind::Transaction, "");
        let segment = tree.append(trans, NodeKind::Segment, "SEG");
        for value in &values {
            tree.append(segment, NodeKind::Element, value.as_str());
        }

        let (doc, diagnostics) = ForwardIndexer::new().index(&tree);
        prop_assert!(diagnostics.is_empty());
        let (text, _) = ReverseFlattener::default().flatten(&doc);

        // Trailing empties leave nothing behind to position them
        let kept = values.iter().rposition(|v| !v.is_empty()).map_or(0, |last| last + 1);
        let mut expected = String::from("SEG");
        for value in &values[..kept] {
            expected.push('*');
            expected.push_str(value);
        }
        expected.push('~');
        prop_assert!(text.contains(&expected), "{} not in {}", expected, text);
    }
}
