use crate::error::StationError;
use crate::station::topology::Topology;
use chrono::NaiveDate;
use std::collections::BTreeSet;

pub const EDGE_DATE_FORMAT: &str = "%Y_%m_%d";
pub const DAY_TOKEN_FORMAT: &str = "%Y.%j";

/// One neighbor of the target station and the raw dates on the shared edge.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NeighborDates {
    pub neighbor: String,
    pub dates: Vec<String>,
}

/// Builds the connected-node date map for `station`. Neighbors are sorted so
/// repeated builds produce identical archives.
pub fn connected_dates(
    topology: &dyn Topology,
    station: &str,
) -> Result<Vec<NeighborDates>, StationError> {
    let mut neighbors = topology.neighbors(station)?;
    neighbors.sort();
    neighbors.dedup();

    let mut out = Vec::with_capacity(neighbors.len());
    for neighbor in neighbors {
        let dates = topology.edge_dates(station, &neighbor)?;
        out.push(NeighborDates { neighbor, dates });
    }
    Ok(out)
}

pub fn parse_edge_date(date: &str) -> Option<NaiveDate> {
    NaiveDate::parse_from_str(date.trim(), EDGE_DATE_FORMAT).ok()
}

/// Deduplicated union of every neighbor's dates, in calendar order.
/// Strings that are not calendar dates are kept (after the valid ones) so the
/// failure surfaces when the date is converted.
pub fn unique_dates(connected: &[NeighborDates]) -> Vec<String> {
    let distinct: BTreeSet<&str> = connected
        .iter()
        .flat_map(|entry| entry.dates.iter().map(String::as_str))
        .collect();

    let mut out: Vec<(Option<NaiveDate>, &str)> = distinct
        .into_iter()
        .map(|date| (parse_edge_date(date), date))
        .collect();
    out.sort_by(|a, b| match (a.0, b.0) {
        (Some(x), Some(y)) => x.cmp(&y).then_with(|| a.1.cmp(b.1)),
        (Some(_), None) => std::cmp::Ordering::Less,
        (None, Some(_)) => std::cmp::Ordering::Greater,
        (None, None) => a.1.cmp(b.1),
    });
    out.into_iter().map(|(_, date)| date.to_string()).collect()
}

/// `2021_02_03` -> `2021.034`, the day-of-year form used in recording file names.
pub fn day_token(date: &str) -> Result<String, StationError> {
    parse_edge_date(date)
        .map(|parsed| parsed.format(DAY_TOKEN_FORMAT).to_string())
        .ok_or_else(|| StationError::DateFormat {
            date: date.to_string(),
        })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::station::topology::TopologyGraph;

    fn entry(neighbor: &str, dates: &[&str]) -> NeighborDates {
        NeighborDates {
            neighbor: neighbor.to_string(),
            dates: dates.iter().map(|d| d.to_string()).collect(),
        }
    }

    #[test]
    fn union_collapses_duplicates_in_calendar_order() {
        let connected = vec![
            entry("N1", &["2021_01_02", "2021_01_01"]),
            entry("N2", &["2021_01_02"]),
        ];
        assert_eq!(unique_dates(&connected), vec!["2021_01_01", "2021_01_02"]);
    }

    #[test]
    fn union_of_no_dates_is_empty() {
        let connected = vec![entry("N1", &[]), entry("N2", &[])];
        assert!(unique_dates(&connected).is_empty());
    }

    #[test]
    fn malformed_dates_stay_in_set_after_valid_ones() {
        let connected = vec![entry("N1", &["garbage", "2020_12_31", "2020_01_01"])];
        assert_eq!(
            unique_dates(&connected),
            vec!["2020_01_01", "2020_12_31", "garbage"]
        );
    }

    #[test]
    fn day_token_uses_zero_padded_day_of_year() {
        assert_eq!(day_token("2021_01_01").expect("token"), "2021.001");
        assert_eq!(day_token("2021_02_03").expect("token"), "2021.034");
        assert_eq!(day_token("2020_12_31").expect("token"), "2020.366");
    }

    #[test]
    fn day_token_rejects_non_calendar_dates() {
        for bad in ["2021-01-01", "2021_02_30", "20210101", ""] {
            let err = day_token(bad).expect_err(bad);
            assert!(matches!(err, StationError::DateFormat { .. }));
        }
    }

    #[test]
    fn connected_dates_sorts_neighbors_and_keeps_empty_edges() {
        let mut graph = TopologyGraph::new();
        graph
            .add_edge("S", "B", Some(vec!["2021_01_01".to_string()]))
            .expect("edge");
        graph.add_edge("S", "A", None).expect("edge");

        let connected = connected_dates(&graph, "S").expect("connected");
        assert_eq!(connected, vec![entry("A", &[]), entry("B", &["2021_01_01"])]);
    }
}
