use reunite_storage::{Profile, RecordId, vector::VectorHit};

pub fn profile(id: RecordId, full_name: &str, detail: &str) -> Profile {
	Profile {
		id,
		full_name: Some(full_name.to_string()),
		detail: Some(detail.to_string()),
		link: Some(format!("https://example.org/profiles/{id}")),
		..Default::default()
	}
}

/// Filler profiles with ids `start..start + count` that match none of the fixture keywords.
pub fn filler_profiles(start: RecordId, count: usize) -> Vec<Profile> {
	(0..count as RecordId)
		.map(|offset| {
			let id = start + offset;

			Profile {
				id,
				title: Some(format!("Hồ sơ số {id}")),
				full_name: Some(format!("Người số {id}")),
				born_year: Some("1950".to_string()),
				losing_year: Some("1975".to_string()),
				detail: Some(format!("Hồ sơ số {id}, mất liên lạc tại Huế.")),
				..Default::default()
			}
		})
		.collect()
}

/// Five profiles, ids 1 through 5, each with `Thương` in the name and `Đông Hà` in the detail.
pub fn dong_ha_profiles() -> Vec<Profile> {
	[
		(1, "Lê Văn Thương", "Thất lạc năm 1984 tại ga Đông Hà, Quảng Trị."),
		(2, "Trần Văn Thương", "Bị đưa cho một người phụ nữ ở ga Đông Hà."),
		(3, "Nguyễn Thị Thương", "Gia đình chuyển vào Đông Hà năm 1984."),
		(4, "Phạm Thương", "Lần cuối được thấy ở chợ Đông Hà."),
		(5, "Hoàng Văn Thương", "Mất liên lạc khi gia đình ở Đông Hà."),
	]
	.into_iter()
	.map(|(id, name, detail)| profile(id, name, detail))
	.collect()
}

/// A collection of `total` profiles whose first five are [`dong_ha_profiles`].
pub fn scenario_profiles(total: usize) -> Vec<Profile> {
	let mut profiles = dong_ha_profiles();
	let filler = total.saturating_sub(profiles.len());

	profiles.extend(filler_profiles(profiles.len() as RecordId + 1, filler));

	profiles
}

pub fn hit(id: RecordId, similarity: f32) -> VectorHit {
	VectorHit { id, similarity }
}
