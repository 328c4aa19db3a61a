use super::fields::TimePair;

/// Placeholder the listing prints when a time is not yet announced.
pub const TBC: &str = "TBC";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TimeSelection {
    /// Raw value of the chosen start time, `None` for an all-day event.
    pub start: Option<String>,
    /// Every row as `value - label`, in source order.
    pub lines: Vec<String>,
}

pub fn select(pairs: &[TimePair], preferred_label: &str) -> TimeSelection {
    let start = by_label(pairs, preferred_label)
        .or_else(|| first_confirmed(pairs))
        .map(|p| p.value.trim().to_string());

    let lines = pairs
        .iter()
        .map(|p| format!("{} - {}", p.value, p.label))
        .collect();

    TimeSelection { start, lines }
}

/// First confirmed pair whose label matches `label`, ignoring case.
pub fn by_label<'a>(pairs: &'a [TimePair], label: &str) -> Option<&'a TimePair> {
    pairs
        .iter()
        .find(|p| is_confirmed(p) && p.label.trim().eq_ignore_ascii_case(label.trim()))
}

/// First confirmed pair in document order.
pub fn first_confirmed(pairs: &[TimePair]) -> Option<&TimePair> {
    pairs.iter().find(|p| is_confirmed(p))
}

fn is_confirmed(pair: &TimePair) -> bool {
    let v = pair.value.trim();
    !v.is_empty() && !v.eq_ignore_ascii_case(TBC)
}

#[cfg(test)]
mod tests {
    use super::*;

    const GATES: &str = "gates open";

    #[test]
    fn prefers_gates_open() {
        let pairs = [
            TimePair::new("11:00am", "Pre-game show"),
            TimePair::new("1:30pm", "Gates Open"),
            TimePair::new("3:15pm", "First ball"),
        ];
        let sel = select(&pairs, GATES);
        assert_eq!(sel.start.as_deref(), Some("1:30pm"));
        assert_eq!(
            sel.lines,
            ["11:00am - Pre-game show", "1:30pm - Gates Open", "3:15pm - First ball"]
        );
    }

    #[test]
    fn tbc_gates_falls_back_to_first_time() {
        let pairs = [
            TimePair::new("TBC", "Gates open"),
            TimePair::new("7:30pm", "Kick off"),
            TimePair::new("9:30pm", "Fireworks"),
        ];
        assert!(by_label(&pairs, GATES).is_none());
        let sel = select(&pairs, GATES);
        assert_eq!(sel.start.as_deref(), Some("7:30pm"));
        assert_eq!(sel.lines[0], "TBC - Gates open");
    }

    #[test]
    fn all_tbc_is_all_day() {
        let pairs = [TimePair::new("TBC", "Gates open"), TimePair::new("tbc", "Start")];
        let sel = select(&pairs, GATES);
        assert_eq!(sel.start, None);
        assert_eq!(sel.lines.len(), 2);
    }

    #[test]
    fn no_rows_is_all_day() {
        let sel = select(&[], GATES);
        assert_eq!(sel.start, None);
        assert!(sel.lines.is_empty());
    }

    #[test]
    fn first_confirmed_skips_tbc() {
        let pairs = [TimePair::new("TBC", "Start"), TimePair::new("2pm", "Start")];
        assert_eq!(first_confirmed(&pairs).map(|p| p.value.as_str()), Some("2pm"));
    }
}
