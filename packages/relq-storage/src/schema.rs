pub fn render_schema() -> String {
	expand_includes(include_str!("../../../sql/init.sql"))
}

fn expand_includes(sql: &str) -> String {
	let mut out = String::new();

	for line in sql.lines() {
		let trimmed = line.trim();

		if let Some(path) = trimmed.strip_prefix("\\ir ") {
			match path.trim() {
				"tables/001_search_endpoints.sql" =>
					out.push_str(include_str!("../../../sql/tables/001_search_endpoints.sql")),
				"tables/002_query_templates.sql" =>
					out.push_str(include_str!("../../../sql/tables/002_query_templates.sql")),
				"tables/003_rulesets.sql" =>
					out.push_str(include_str!("../../../sql/tables/003_rulesets.sql")),
				"tables/004_judgement_sets.sql" =>
					out.push_str(include_str!("../../../sql/tables/004_judgement_sets.sql")),
				"tables/005_judgement_phrases.sql" =>
					out.push_str(include_str!("../../../sql/tables/005_judgement_phrases.sql")),
				"tables/006_judgement_votes.sql" =>
					out.push_str(include_str!("../../../sql/tables/006_judgement_votes.sql")),
				"tables/007_search_configurations.sql" =>
					out.push_str(include_str!("../../../sql/tables/007_search_configurations.sql")),
				"tables/008_search_configuration_rulesets.sql" => out.push_str(include_str!(
					"../../../sql/tables/008_search_configuration_rulesets.sql"
				)),
				"tables/009_search_configuration_judgements.sql" => out.push_str(include_str!(
					"../../../sql/tables/009_search_configuration_judgements.sql"
				)),
				"tables/010_executions.sql" =>
					out.push_str(include_str!("../../../sql/tables/010_executions.sql")),
				"tables/011_search_phrase_executions.sql" => out
					.push_str(include_str!("../../../sql/tables/011_search_phrase_executions.sql")),
				_ => out.push_str(line),
			}
		} else {
			out.push_str(line);
		}

		out.push('\n');
	}

	out
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn expands_every_include() {
		let sql = render_schema();

		assert!(!sql.contains("\\ir "), "Unexpanded include left in schema.");

		for table in [
			"search_endpoints",
			"query_templates",
			"rulesets",
			"judgement_sets",
			"judgement_phrases",
			"judgement_votes",
			"search_configurations",
			"search_configuration_rulesets",
			"search_configuration_judgements",
			"executions",
			"search_phrase_executions",
		] {
			assert!(
				sql.contains(&format!("CREATE TABLE IF NOT EXISTS {table} (")),
				"Missing table {table}."
			);
		}
	}
}
