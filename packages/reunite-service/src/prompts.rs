use reunite_storage::Profile;

const KEYWORD_INSTRUCTIONS: &str = "\
You analyse notices written by families searching for missing relatives. Extract the most \
important search keywords from the notice, then add related terms derived from them. Personal \
names may be split into the given name alone (for example, Lê Thị Hạnh => Hạnh). Related terms \
may be derived from main keywords (for example, chiến tranh => xung đột, chạy giặc, vượt biên, \
di cư). Keywords can be personal names, place names, birth years, addresses, identifying marks, \
memories or any other detail that helps locate the person. Return the keywords and related terms \
as one comma-separated list.";

const KEYWORD_EXAMPLES: [(&str, &str); 3] = [
	(
		"Chị Lê Thị Mỹ Duyên tìm bác Lê Viết Thi, đi vượt biên mất liên lạc khoảng năm 1978. Ông \
		 Lê Viết Thi sinh năm 1946, quê Quảng Nam. Bố mẹ là cụ Lê Viết Y và cụ Nguyễn Thị Ca. Anh \
		 chị em trong gia đình là Viết, Thơ, Dũng, Chung, Mười, Sỹ và Tượng. Khoảng năm 1978, ông \
		 Lê Viết Thi đi vượt biên. Từ đó, gia đình không còn nghe tin tức gì về ông.",
		"Lê Thị Mỹ Duyên, Duyên, Lê Viết Thi, Thi, vượt biên, di cư, chiến tranh, chạy giặc, 1978, \
		 1946, Quảng Nam, Lê Viết Y, Y, Nguyễn Thị Ca, Ca, Viết, Thơ, Dũng, Chung, Mười, Sỹ, Tượng",
	),
	(
		"Chị Lê Thị Toàn tìm anh Lê Văn Thương, mất liên lạc năm 1984 tại ga Đông Hà, Quảng Trị. \
		 Vào năm 1984, gia đình ông Tiên và bà Tẻo từ Thanh Hóa di chuyển vào Quảng Trị. Khi đến ga \
		 Đông Hà, vì hoàn cảnh quá khó khăn, ông Tiên bị tật ở chân, còn bà Tẻo không minh mẫn nên \
		 đã mang con trai Lê Văn Thương vừa mới sinh cho một người phụ nữ ở ga Đông Hà.",
		"Lê Thị Toàn, Toàn, Lê Văn Thương, Thương, 1984, Đông Hà, Quảng Trị, Tiên, Tẻo, Thanh Hóa, \
		 di chuyển, di cư, khó khăn, nghèo khổ, tật, khiếm khuyết, không minh mẫn, tâm thần, mới \
		 sinh, sơ sinh",
	),
	(
		"Chị Nguyễn Thị Yến tìm ba Nguyễn Văn Đã mất liên lạc năm 1977. Ông Nguyễn Văn Đã, sinh năm \
		 1939, không rõ quê quán. Khoảng năm 1970, bà Vũ Thị Hải gặp ông ở nông trường Sao Đỏ tại \
		 Mộc Châu, Sơn La. Ông Đã phụ trách lái xe lương thực cho nông trường. Năm 1979, bà Hải mang \
		 con về khu tập thể nhà máy nước Nam Định.",
		"Nguyễn Thị Yến, Yến, Nguyễn Văn Đã, Đã, 1977, 1939, 1970, Vũ Thị Hải, Hải, nông trường, Sao \
		 Đỏ, Mộc Châu, Sơn La, lái xe, lương thực, nông nghiệp, khu tập thể, nhà máy nước, Nam Định, \
		 1979",
	),
];

const KEYWORD_STOPLIST_NOTE: &str = "\
Skip words that are too common to narrow a search, such as gia đình, anh, em, vợ, chồng, tìm \
kiếm, thất lạc, mất tích, mất liên lạc, không rõ quê quán, không rõ năm sinh.";

const VERIFY_INSTRUCTIONS: &str = "\
You are a meticulous analyst of missing-person notices. Decide which of the profiles below \
describe exactly the same person and the same circumstances of separation as the search \
request.

Compare these core details very carefully:
- Name of the missing person: must match or be very close.
- Names of father, mother and siblings, when the request gives them: must match or be very close.
- Birth year: must match or be approximately equal.
- Hometown or related addresses: must match or be logically related.
- Circumstances of separation (time, place, main events): must be substantially similar.

Exclusion rules:
- If the missing person's name clearly differs from the request, reject the profile regardless \
of other details.
- If the parents' or siblings' names given in the request are completely different, the profile \
is most likely not a match.
- Agreement on place or birth year alone is not enough when core names and circumstances differ.

Each profile has an Index, a Title, a Name and a Detail description.";

const VERIFY_ANSWER_FORMAT: &str = "\
Return only the Index values (numeric ids) of profiles you are highly confident match on all \
core criteria above, one Index per line. If no profile truly matches, return 'none'.";

const MODERATION_INSTRUCTIONS: &str = "\
You moderate search requests submitted to a service that reunites missing relatives. Decide \
whether the request below is appropriate for that service.

Check that the request:
1. Contains no violent, racist, religious or gender discrimination content.
2. Contains no insulting or vulgar language.
3. Contains no sensitive personal data unrelated to finding a missing person.
4. Contains no advertising or spam.
5. Contains no fraud or impersonation.

Do not be overly strict. Searches for mixed-race relatives are ordinary content, not \
discrimination. Identifying marks on the body are ordinary content, not obscenity.

Reply with JSON only, in this shape:
{\"is_appropriate\": true, \"feedback\": \"why the request is or is not appropriate\"}";

const SEPARATOR: &str = "------------------------------------";

pub fn keyword_prompt(query: &str) -> String {
	let mut prompt = String::from(KEYWORD_INSTRUCTIONS);

	for (index, (notice, keywords)) in KEYWORD_EXAMPLES.iter().enumerate() {
		prompt.push_str(&format!(
			"\n\nExample {}:\nNotice: {notice}\nKeywords: {keywords}",
			index + 1
		));
	}

	prompt.push_str("\n\n");
	prompt.push_str(KEYWORD_STOPLIST_NOTE);
	prompt.push_str(&format!("\n\nCurrent notice:\n{query}\n\nKeywords:"));

	prompt
}

pub fn verify_prompt(query: &str, profiles: &[&Profile], detail_max_chars: usize) -> String {
	let mut listing = String::new();

	for profile in profiles {
		listing.push_str(&profile_block(profile, detail_max_chars));
	}

	format!(
		"{VERIFY_INSTRUCTIONS}\n\nSearch request:\n{query}\n{SEPARATOR}\n\nProfiles to check:\n\
		 {SEPARATOR}\n{listing}{SEPARATOR}\n\n{VERIFY_ANSWER_FORMAT}\n"
	)
}

pub fn moderation_prompt(query: &str) -> String {
	format!("{MODERATION_INSTRUCTIONS}\n\nRequest to moderate:\n{query}\n")
}

fn profile_block(profile: &Profile, detail_max_chars: usize) -> String {
	let title = profile.title.as_deref().unwrap_or("N/A");
	let name = profile.full_name.as_deref().unwrap_or("N/A");
	let detail = profile.detail.as_deref().unwrap_or("N/A").replace('\\', "/");
	let detail: String = detail.chars().take(detail_max_chars).collect();

	format!(
		"\nIndex: {}\nTitle: {title}\nName: {name}\nDetail: {detail}\n{}",
		profile.id,
		"-".repeat(40)
	)
}
