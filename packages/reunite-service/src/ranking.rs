use std::collections::HashMap;

use serde::Serialize;

use reunite_storage::RecordId;

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct RankedCandidate {
	pub id: RecordId,
	pub total_score: f32,
	pub vector_score: f32,
	pub keyword_matches: u32,
}
impl RankedCandidate {
	pub fn keyword_score(&self, keyword_bonus: f32) -> f32 {
		self.keyword_matches as f32 * keyword_bonus
	}
}

/// Fuses keyword counts and vector similarity over `ids`, keeps positive scores, sorts them
/// descending (stable, so ties keep `ids` order) and truncates to `top_n`.
pub fn rank_candidates<I>(
	ids: I,
	matches: &HashMap<RecordId, u32>,
	similarity: &HashMap<RecordId, f32>,
	keyword_bonus: f32,
	top_n: usize,
) -> Vec<RankedCandidate>
where
	I: IntoIterator<Item = RecordId>,
{
	let mut ranked: Vec<RankedCandidate> = ids
		.into_iter()
		.filter_map(|id| {
			let keyword_matches = matches.get(&id).copied().unwrap_or(0);
			let vector_score = similarity.get(&id).copied().unwrap_or(0.0);
			let total_score = vector_score + keyword_matches as f32 * keyword_bonus;

			(total_score > 0.0).then_some(RankedCandidate {
				id,
				total_score,
				vector_score,
				keyword_matches,
			})
		})
		.collect();

	ranked.sort_by(|a, b| b.total_score.total_cmp(&a.total_score));
	ranked.truncate(top_n);

	ranked
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn zero_scores_are_dropped_and_order_is_descending() {
		let matches = HashMap::from([(2, 1), (4, 3)]);
		let similarity = HashMap::from([(1, 0.4), (2, 0.5)]);
		let ranked = rank_candidates([1, 2, 3, 4], &matches, &similarity, 0.05, 10);
		let ids: Vec<RecordId> = ranked.iter().map(|c| c.id).collect();

		assert_eq!(ids, vec![2, 1, 4]);
		assert!((ranked[0].total_score - 0.55).abs() < 1e-6);
		assert!((ranked[2].total_score - 0.15).abs() < 1e-6);
		assert!(ranked.windows(2).all(|pair| pair[0].total_score >= pair[1].total_score));
	}

	#[test]
	fn ties_keep_scan_order() {
		let matches = HashMap::from([(9, 1), (3, 1), (6, 1)]);
		let ranked = rank_candidates([9, 3, 6], &matches, &HashMap::new(), 0.05, 10);
		let ids: Vec<RecordId> = ranked.iter().map(|c| c.id).collect();

		assert_eq!(ids, vec![9, 3, 6]);
	}

	#[test]
	fn truncates_to_top_n() {
		let similarity: HashMap<RecordId, f32> = (0..50).map(|id| (id, 0.5)).collect();
		let ranked = rank_candidates(0..50, &HashMap::new(), &similarity, 0.05, 7);

		assert_eq!(ranked.len(), 7);
		assert_eq!(ranked[6].id, 6);
	}
}
