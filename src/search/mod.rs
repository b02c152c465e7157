use fuzzy_matcher::skim::SkimMatcherV2;
use fuzzy_matcher::FuzzyMatcher;
use serde::Serialize;
use tracing::debug;

use crate::dataset::Table;

/// One fuzzy match against the country table.
#[derive(Debug, Clone, Serialize)]
pub struct CountryMatch {
    pub country: String,
    pub continent: String,
    pub score: i64,
    pub matched_on: &'static str,
}

/// Fuzzy search over country and continent names, best matches first.
/// Score ties keep table order; results are truncated to `limit`.
pub fn search_countries(table: &Table, query: &str, limit: usize) -> Vec<CountryMatch> {
    let matcher = SkimMatcherV2::default();
    let mut matches: Vec<CountryMatch> = table
        .records()
        .iter()
        .filter_map(|record| {
            let by_country = matcher.fuzzy_match(&record.country, query);
            let by_continent = matcher.fuzzy_match(&record.continent, query);
            let (score, matched_on) = match (by_country, by_continent) {
                (Some(c), Some(k)) if k > c => (k, "continent"),
                (Some(c), _) => (c, "country"),
                (None, Some(k)) => (k, "continent"),
                (None, None) => return None,
            };
            Some(CountryMatch {
                country: record.country.clone(),
                continent: record.continent.clone(),
                score,
                matched_on,
            })
        })
        .collect();

    matches.sort_by(|a, b| b.score.cmp(&a.score));
    matches.truncate(limit);
    debug!("query '{}' matched {} rows", query, matches.len());
    matches
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dataset::CountryRecord;

    fn sample_table() -> Table {
        Table::from_records(vec![
            CountryRecord::new("Luxembourg", "Europe"),
            CountryRecord::new("Lebanon", "Asia"),
            CountryRecord::new("Latvia", "Europe"),
            CountryRecord::new("Uganda", "Africa"),
        ])
    }

    #[test]
    fn exact_country_name_ranks_first() {
        let results = search_countries(&sample_table(), "luxembourg", 10);
        assert!(!results.is_empty());
        assert_eq!(results[0].country, "Luxembourg");
        assert_eq!(results[0].matched_on, "country");
    }

    #[test]
    fn continent_queries_match_every_member() {
        let results = search_countries(&sample_table(), "europe", 10);
        let countries: Vec<&str> = results.iter().map(|m| m.country.as_str()).collect();
        assert!(countries.contains(&"Luxembourg"));
        assert!(countries.contains(&"Latvia"));
        assert!(results.iter().all(|m| m.matched_on == "continent"));
    }

    #[test]
    fn limit_truncates_and_gibberish_matches_nothing() {
        let results = search_countries(&sample_table(), "l", 2);
        assert!(results.len() <= 2);
        assert!(search_countries(&sample_table(), "qqxxzz", 10).is_empty());
    }
}
