use serde::{Deserialize, Serialize};

pub type RecordId = i64;

/// One missing-person notice. Every attribute is free text as published.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize, sqlx::FromRow)]
pub struct Profile {
	pub id: RecordId,
	pub title: Option<String>,
	pub full_name: Option<String>,
	pub born_year: Option<String>,
	pub losing_year: Option<String>,
	pub name_of_father: Option<String>,
	pub name_of_mother: Option<String>,
	pub siblings: Option<String>,
	pub detail: Option<String>,
	pub link: Option<String>,
}
impl Profile {
	pub const TEXT_FIELD_COUNT: usize = 9;

	/// Textual attributes in column order, absent ones as `None`.
	pub fn text_fields(&self) -> [Option<&str>; Self::TEXT_FIELD_COUNT] {
		[
			self.title.as_deref(),
			self.full_name.as_deref(),
			self.born_year.as_deref(),
			self.losing_year.as_deref(),
			self.name_of_father.as_deref(),
			self.name_of_mother.as_deref(),
			self.siblings.as_deref(),
			self.detail.as_deref(),
			self.link.as_deref(),
		]
	}
}
