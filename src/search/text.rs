use crate::store::{CloudProvider, Record};

/// Catalog browsing filter. Empty provider or team sets match everything.
#[derive(Debug, Default, Clone)]
pub struct ListFilter {
    pub providers: Vec<CloudProvider>,
    pub teams: Vec<String>,
    pub keyword: Option<String>,
}

impl ListFilter {
    pub fn matches(&self, record: &Record) -> bool {
        if !self.providers.is_empty() && !self.providers.contains(&record.cloud_provider) {
            return false;
        }
        if !self.teams.is_empty() && !self.teams.iter().any(|t| *t == record.team.primary) {
            return false;
        }
        match self.keyword.as_deref().map(str::trim) {
            Some(k) if !k.is_empty() => {
                let k = k.to_lowercase();
                record.system_name.to_lowercase().contains(&k)
                    || record.description.to_lowercase().contains(&k)
            }
            _ => true,
        }
    }

    /// Matching records, in corpus order.
    pub fn apply<'a>(&self, records: &'a [Record]) -> Vec<&'a Record> {
        records.iter().filter(|r| self.matches(r)).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::search::testing::record;

    fn corpus() -> Vec<Record> {
        let mut a = record("1", "Order management on EC2");
        a.system_name = "Order Hub".into();
        let mut b = record("2", "Image resizing service");
        b.cloud_provider = CloudProvider::Gcp;
        b.team.primary = "media".into();
        let mut c = record("3", "Billing exports");
        c.cloud_provider = CloudProvider::Azure;
        vec![a, b, c]
    }

    fn ids(records: &[&Record]) -> Vec<String> {
        records.iter().map(|r| r.id.clone()).collect()
    }

    #[test]
    fn empty_filter_keeps_everything_in_order() {
        let records = corpus();
        assert_eq!(ids(&ListFilter::default().apply(&records)), vec!["1", "2", "3"]);
    }

    #[test]
    fn provider_and_team_filters_combine() {
        let records = corpus();
        let filter = ListFilter {
            providers: vec![CloudProvider::Aws, CloudProvider::Azure],
            teams: vec!["platform".into()],
            keyword: None,
        };
        assert_eq!(ids(&filter.apply(&records)), vec!["1", "3"]);
    }

    #[test]
    fn keyword_matches_name_or_description_case_insensitively() {
        let records = corpus();
        let by_name = ListFilter {
            keyword: Some("order hub".into()),
            ..Default::default()
        };
        assert_eq!(ids(&by_name.apply(&records)), vec!["1"]);

        let by_description = ListFilter {
            keyword: Some("RESIZING".into()),
            ..Default::default()
        };
        assert_eq!(ids(&by_description.apply(&records)), vec!["2"]);
    }

    #[test]
    fn blank_keyword_is_ignored() {
        let records = corpus();
        let filter = ListFilter {
            keyword: Some("  ".into()),
            ..Default::default()
        };
        assert_eq!(filter.apply(&records).len(), 3);
    }
}
