//! Pattern type → soul section mapping

/// Returns the soul sections a pattern type refines. Unknown types map to
/// nothing and produce no proposal.
pub fn map_pattern_to_sections(pattern_type: &str) -> Vec<&'static str> {
    match pattern_type {
        "correction" => vec!["thinking_mode", "anti_patterns"],
        "pushback" => vec!["anti_patterns"],
        "philosophy" => vec!["philosophy"],
        "reframing" => vec!["thinking_mode"],
        "direction" => vec!["interaction_modes"],
        _ => Vec::new(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn known_types_map_to_sections() {
        assert_eq!(
            map_pattern_to_sections("correction"),
            vec!["thinking_mode", "anti_patterns"]
        );
        assert_eq!(map_pattern_to_sections("pushback"), vec!["anti_patterns"]);
        assert_eq!(map_pattern_to_sections("philosophy"), vec!["philosophy"]);
        assert_eq!(map_pattern_to_sections("reframing"), vec!["thinking_mode"]);
        assert_eq!(
            map_pattern_to_sections("direction"),
            vec!["interaction_modes"]
        );
    }

    #[test]
    fn unknown_type_maps_to_nothing() {
        assert!(map_pattern_to_sections("sarcasm").is_empty());
        assert!(map_pattern_to_sections("").is_empty());
    }
}
