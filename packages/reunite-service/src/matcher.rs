use std::collections::HashMap;

use unicode_normalization::UnicodeNormalization;

use reunite_storage::{Profile, RecordId};

/// NFC plus lowercase, so composed and decomposed diacritics compare equal.
pub fn normalize_text(text: &str) -> String {
	text.nfc().collect::<String>().to_lowercase()
}

/// Counts, per profile, one hit for every keyword found in every textual field. Profiles with no
/// hit are absent from the map.
pub fn match_counts(keywords: &[String], profiles: &[Profile]) -> HashMap<RecordId, u32> {
	let keywords: Vec<String> = keywords
		.iter()
		.map(|keyword| normalize_text(keyword.trim()))
		.filter(|keyword| !keyword.is_empty())
		.collect();
	let mut counts = HashMap::new();

	if keywords.is_empty() {
		return counts;
	}

	for profile in profiles {
		let fields: Vec<String> =
			profile.text_fields().into_iter().flatten().map(normalize_text).collect();
		let mut hits = 0_u32;

		for keyword in &keywords {
			hits += fields.iter().filter(|field| field.contains(keyword.as_str())).count() as u32;
		}

		if hits > 0 {
			counts.insert(profile.id, hits);
		}
	}

	counts
}
