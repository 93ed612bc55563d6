use crosswalk_catalog::{Catalog, Regulations};
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

use crate::types::{MappedControl, MappingResult};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AggregatedControl {
    pub control_id: String,
    pub domain: String,
    pub description: String,
    pub weight: u32,
    pub hit_count: u32,
    pub total_confidence: u32,
    pub sample_justification: String,
    pub regulations: Regulations,
    pub average_confidence: u32,
    pub priority_score: u64,
}

impl AggregatedControl {
    fn first_hit(mapping: &MappedControl, catalog: &Catalog) -> Self {
        let (domain, description, weight, regulations) = match catalog.get(&mapping.control_id) {
            Some(record) => (
                record.domain.clone(),
                record.description.clone(),
                record.effective_weight(),
                record.regulations.clone(),
            ),
            None => (
                mapping.domain.clone(),
                mapping.description.clone().unwrap_or_default(),
                1,
                mapping.regulations.clone(),
            ),
        };
        Self {
            control_id: mapping.control_id.clone(),
            domain,
            description,
            weight,
            hit_count: 0,
            total_confidence: 0,
            sample_justification: mapping.justification.clone(),
            regulations,
            average_confidence: 0,
            priority_score: 0,
        }
    }

    fn finish(&mut self) {
        self.average_confidence = rounded_average(self.total_confidence, self.hit_count);
        self.priority_score = u64::from(self.weight) * u64::from(self.hit_count);
    }
}

fn rounded_average(total: u32, count: u32) -> u32 {
    if count == 0 {
        return 0;
    }
    let (total, count) = (u64::from(total), u64::from(count));
    ((2 * total + count) / (2 * count)) as u32
}

pub fn aggregate<'r, I>(items: I, catalog: &Catalog) -> Vec<AggregatedControl>
where
    I: IntoIterator<Item = (usize, &'r MappingResult)>,
{
    let mut ordered: Vec<(usize, &'r MappingResult)> = items.into_iter().collect();
    ordered.sort_by_key(|(index, _)| *index);

    let mut merged: IndexMap<String, AggregatedControl> = IndexMap::new();
    for (_, result) in ordered {
        for mapping in result.iter() {
            let entry = merged
                .entry(mapping.control_id.clone())
                .or_insert_with(|| AggregatedControl::first_hit(mapping, catalog));
            entry.hit_count += 1;
            entry.total_confidence += u32::from(mapping.confidence);
        }
    }

    let mut controls: Vec<AggregatedControl> = merged
        .into_values()
        .map(|mut control| {
            control.finish();
            control
        })
        .collect();
    // stable: ties keep first-seen order
    controls.sort_by(|a, b| b.priority_score.cmp(&a.priority_score));
    controls
}
