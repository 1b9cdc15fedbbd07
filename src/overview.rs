use std::collections::{BTreeMap, HashSet};

use crate::models::{Overview, RecordSet, RegionHeat};

pub fn overview(records: &RecordSet) -> Overview {
    let users: HashSet<&str> = records.records.iter().map(|r| r.user_id.as_str()).collect();
    let regions: HashSet<&str> = records.records.iter().map(|r| r.region.as_str()).collect();
    let skills: HashSet<&str> = records
        .records
        .iter()
        .flat_map(|r| r.skill_tags.iter().map(String::as_str))
        .collect();

    Overview {
        total_records: records.len(),
        total_users: users.len(),
        total_regions: regions.len(),
        total_skills: skills.len(),
    }
}

/// Total skill-tag occurrences per region, busiest first.
pub fn region_heatmap(records: &RecordSet) -> Vec<RegionHeat> {
    let mut counts: BTreeMap<&str, usize> = BTreeMap::new();
    for record in &records.records {
        *counts.entry(record.region.as_str()).or_insert(0) += record.skill_tags.len();
    }

    let mut heat: Vec<RegionHeat> = counts
        .into_iter()
        .map(|(region, skill_count)| RegionHeat {
            region: region.to_string(),
            skill_count,
        })
        .collect();
    heat.sort_by(|a, b| {
        b.skill_count
            .cmp(&a.skill_count)
            .then_with(|| a.region.cmp(&b.region))
    });
    heat
}
