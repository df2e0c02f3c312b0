//! Record mapping for the `proposal` stream.
//!
//! Proposal documents nest per-advertiser scores, channel estimates and
//! product budgets several levels deep. Before the schema mapper runs, a
//! working copy of the document has `scores` narrowed to the advertiser's own
//! (non-competitor) score object and `solutions` narrowed to solution names,
//! so schema fields like `scores_overallScore` and `solutions` resolve
//! directly. Afterwards derived columns are written for competitor scores,
//! per-channel estimates, product budgets and proposal metadata.

use serde_json::{Map, Value};

use crate::{
    coerce::{join_text, parse_number, passthrough, render_text, text_value},
    document::{Document, is_truthy, truthy},
    mapper::{MappingError, RecordMapper, SchemaRecordMapper},
    record::{Record, RecordValue},
};

/// Budget column and the product label its summary name must contain.
pub const PRODUCT_BUDGET_COLUMNS: [(&str, &str); 14] = [
    ("searchBudget", "Search"),
    ("displayBudget", "Display"),
    ("retargetingBudget", "Retargeting"),
    ("socialBudget", "Social"),
    ("videoBudget", "Video"),
    ("ottBudget", "OTT"),
    ("audioBudget", "Audio"),
    ("seoBudget", "SEO"),
    ("websiteBudget", "Website"),
    ("listingsBudget", "Listings"),
    ("reviewsBudget", "Reviews"),
    ("chatBudget", "Chat"),
    ("targetedEmailBudget", "Targeted Email"),
    ("leadManagementBudget", "Lead Management"),
];

/// Columns written after the schema fields, in output order.
pub const DERIVED_COLUMNS: [&str; 38] = [
    "scores_score",
    "scores_competitorCount",
    "scores_competitorScores",
    "estimates_displayTactics",
    "estimates_socialConfigurationType",
    "estimates_socialObjective",
    "estimates_videoMarketingObjective",
    "search_estimates_campaignName",
    "search_estimates_websiteUrl",
    "search_estimates_categories",
    "search_estimates_locationTypes",
    "search_estimates_locations",
    "search_estimates_estimationType",
    "search_estimates_includeOneWordKeywords",
    "search_estimates_mediumBudget",
    "search_estimates_keywordCount",
    "search_estimates_averagePosition",
    "search_estimates_keywords",
    "search_estimates_keywordIdeas",
    "search_estimates_includeKeywords",
    "search_estimates_excludeKeywords",
    "search_estimates_customKeywords",
    "searchBudget",
    "displayBudget",
    "retargetingBudget",
    "socialBudget",
    "videoBudget",
    "ottBudget",
    "audioBudget",
    "seoBudget",
    "websiteBudget",
    "listingsBudget",
    "reviewsBudget",
    "chatBudget",
    "targetedEmailBudget",
    "leadManagementBudget",
    "goals",
    "originalProducts",
];

/// Display estimation categories; later entries overwrite earlier ones.
const DISPLAY_ESTIMATIONS: [&str; 2] = ["gannettDisplayEstimations", "rlDisplayEstimations"];

const RADIUS_LOCATION: &str = "RADIUS";

pub struct ProposalRecordTransformer {
    base: SchemaRecordMapper,
}

impl ProposalRecordTransformer {
    pub fn new(base: SchemaRecordMapper) -> Self {
        Self { base }
    }
}

impl RecordMapper for ProposalRecordTransformer {
    fn map(&self, doc: &Document) -> Result<Record, MappingError> {
        let scores = doc
            .get("scores")
            .and_then(Value::as_array)
            .map(Vec::as_slice)
            .unwrap_or_default();
        let primary = scores.iter().find(|score| !is_competitor(score));

        let working = working_copy(doc, primary);
        let mut record = self.base.map(&working)?;

        apply_score_columns(&mut record, scores, primary);
        if let Some(estimates) = truthy(doc.get("estimates")) {
            apply_estimate_columns(&mut record, estimates);
        }
        if let Some(Value::Array(summaries)) = truthy(doc.get("productSummaries")) {
            apply_budget_columns(&mut record, summaries);
        }
        if let Some(metadata) = truthy(doc.get("metadata")) {
            apply_metadata_columns(&mut record, metadata);
        }
        Ok(record)
    }

    fn columns(&self) -> Vec<String> {
        let mut columns = self.base.columns();
        for name in DERIVED_COLUMNS {
            if !columns.iter().any(|existing| existing == name) {
                columns.push(name.to_string());
            }
        }
        columns
    }
}

fn is_competitor(score: &Value) -> bool {
    score
        .pointer("/advertiser/isCompetitor")
        .is_some_and(is_truthy)
}

fn working_copy(doc: &Document, primary: Option<&Value>) -> Document {
    let mut working = doc.clone();
    working.insert(
        "scores".to_string(),
        primary.cloned().unwrap_or_else(|| Value::Object(Map::new())),
    );
    if let Some(Value::Array(solutions)) = doc.get("solutions") {
        if solutions.iter().any(Value::is_object) {
            let names = solutions
                .iter()
                .map(|solution| match solution {
                    Value::Object(fields) => fields.get("name").cloned().unwrap_or(Value::Null),
                    other => other.clone(),
                })
                .collect();
            working.insert("solutions".to_string(), Value::Array(names));
        }
    }
    working
}

fn apply_score_columns(record: &mut Record, scores: &[Value], primary: Option<&Value>) {
    let competitors = scores
        .iter()
        .filter(|score| is_competitor(score))
        .collect::<Vec<_>>();
    if !competitors.is_empty() {
        record.set(
            "scores_competitorCount",
            RecordValue::Integer(competitors.len() as i64),
        );
        record.set(
            "scores_competitorScores",
            join_text(
                competitors
                    .iter()
                    .map(|score| score.get("overallScore").map(render_text).unwrap_or_default()),
            ),
        );
    }
    let score = primary
        .and_then(|score| score.get("overallScore"))
        .map(passthrough)
        .unwrap_or_default();
    record.set("scores_score", score);
}

fn apply_estimate_columns(record: &mut Record, estimates: &Value) {
    for category in DISPLAY_ESTIMATIONS {
        if let Some(display) = truthy(estimates.get(category)) {
            record.set(
                "estimates_displayTactics",
                join_entries(display.get("tactics"), "name"),
            );
        }
    }
    if let Some(social) = truthy(estimates.get("socialEstimations")) {
        record.set(
            "estimates_socialConfigurationType",
            text_at(social, "/configuration/type"),
        );
        record.set(
            "estimates_socialObjective",
            text_at(social, "/configuration/objective"),
        );
    }
    if let Some(video) = truthy(estimates.get("videoAdsEstimations")) {
        record.set(
            "estimates_videoMarketingObjective",
            text_at(video, "/configuration/marketingObjective"),
        );
    }
    if let Some(search) = truthy(estimates.get("searchEstimations")) {
        apply_search_columns(record, search);
    }
}

fn apply_search_columns(record: &mut Record, search: &Value) {
    record.set("search_estimates_campaignName", text_at(search, "/campaignName"));
    record.set("search_estimates_websiteUrl", text_at(search, "/websiteUrl"));
    record.set(
        "search_estimates_categories",
        join_entries(search.get("categories"), "name"),
    );

    let locations = entries(search.get("locations"));
    let mut location_types: Vec<String> = Vec::new();
    for location in locations {
        let kind = text_at(location, "/type");
        if !kind.is_empty() && !location_types.contains(&kind) {
            location_types.push(kind);
        }
    }
    record.set("search_estimates_locationTypes", join_text(&location_types));
    record.set(
        "search_estimates_locations",
        join_text(
            locations
                .iter()
                .map(describe_location)
                .filter(|description| !description.is_empty()),
        ),
    );

    record.set(
        "search_estimates_estimationType",
        text_at(search, "/estimationType"),
    );
    record.set(
        "search_estimates_includeOneWordKeywords",
        search
            .get("includeOneWordKeywords")
            .map(passthrough)
            .unwrap_or_default(),
    );

    if let Some(budgets) = truthy(search.get("budgetEstimates")) {
        let medium = budgets.get("medium");
        let numeric = |key: &str| {
            medium
                .and_then(|tier| truthy(tier.get(key)))
                .map(passthrough)
                .unwrap_or(RecordValue::Integer(0))
        };
        record.set("search_estimates_mediumBudget", numeric("budget"));
        record.set("search_estimates_keywordCount", numeric("keywordCount"));
        let position = medium
            .and_then(|tier| tier.get("averagePosition"))
            .and_then(|value| parse_number(value).ok())
            .unwrap_or(0.0);
        record.set("search_estimates_averagePosition", RecordValue::Number(position));
        record.set(
            "search_estimates_keywords",
            join_entries(medium.and_then(|tier| tier.get("keywords")), "text"),
        );
    }

    record.set(
        "search_estimates_keywordIdeas",
        join_entries(search.get("keywordIdeas"), "text"),
    );
    let filter = search.get("keywordFilter");
    record.set(
        "search_estimates_includeKeywords",
        join_entries(filter.and_then(|f| f.get("includeKeywords")), "text"),
    );
    record.set(
        "search_estimates_excludeKeywords",
        join_entries(filter.and_then(|f| f.get("negativeKeywords")), "text"),
    );
    record.set(
        "search_estimates_customKeywords",
        join_entries(search.get("customKeywords"), "keyword"),
    );
}

fn describe_location(location: &Value) -> String {
    let kind = text_at(location, "/type");
    if kind.eq_ignore_ascii_case(RADIUS_LOCATION) {
        let radius = text_at(location, "/radius");
        let address = text_at(location, "/address");
        if radius.is_empty() && address.is_empty() {
            String::new()
        } else {
            format!("{radius} from {address}")
        }
    } else {
        text_at(location, "/name")
    }
}

fn apply_budget_columns(record: &mut Record, summaries: &[Value]) {
    for (column, label) in PRODUCT_BUDGET_COLUMNS {
        let budget = summaries
            .iter()
            .filter(|summary| {
                summary
                    .get("productName")
                    .and_then(Value::as_str)
                    .is_some_and(|name| name.contains(label))
            })
            .find_map(|summary| truthy(summary.get("productBudget")));
        if let Some(budget) = budget {
            record.set(column, passthrough(budget));
        }
    }
}

fn apply_metadata_columns(record: &mut Record, metadata: &Value) {
    let configs = metadata.get("defaultProposalConfigs");
    record.set(
        "goals",
        join_entries(configs.and_then(|c| c.get("goals")), "name"),
    );
    record.set(
        "originalProducts",
        join_entries(configs.and_then(|c| c.get("selectedProducts")), "name"),
    );
}

fn entries(value: Option<&Value>) -> &[Value] {
    value
        .and_then(Value::as_array)
        .map(Vec::as_slice)
        .unwrap_or_default()
}

/// Text of one list entry: plain scalars as-is, objects via `field`.
fn entry_text(entry: &Value, field: &str) -> String {
    match entry {
        Value::Object(fields) => fields.get(field).map(render_text).unwrap_or_default(),
        other => render_text(other),
    }
}

/// Comma-joins a possibly missing or null list of entries.
fn join_entries(list: Option<&Value>, field: &str) -> String {
    join_text(entries(list).iter().map(|entry| entry_text(entry, field)))
}

fn text_at(value: &Value, pointer: &str) -> String {
    value.pointer(pointer).map(text_value).unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::{FieldKind, FieldSpec, Schema};
    use serde_json::json;
    use std::sync::Arc;

    fn transformer(fields: Vec<FieldSpec>) -> ProposalRecordTransformer {
        let schema = Arc::new(Schema::from_fields(fields));
        ProposalRecordTransformer::new(SchemaRecordMapper::new(schema, "grader"))
    }

    fn doc(value: Value) -> Document {
        crate::document::document_from_json(value).unwrap()
    }

    #[test]
    fn competitor_flag_reads_nested_advertiser() {
        assert!(is_competitor(&json!({"advertiser": {"isCompetitor": true}})));
        assert!(!is_competitor(&json!({"advertiser": {"isCompetitor": false}})));
        assert!(!is_competitor(&json!({"overallScore": 3})));
    }

    #[test]
    fn declared_columns_cover_every_derived_column() {
        let transformer = transformer(vec![
            FieldSpec::new("_id", FieldKind::Text),
            FieldSpec::new("searchBudget", FieldKind::Number),
        ]);
        let record = transformer
            .map(&doc(json!({
                "_id": "p1",
                "scores": [
                    {"advertiser": {"isCompetitor": true}, "overallScore": 4},
                    {"advertiser": {"isCompetitor": false}, "overallScore": 8}
                ],
                "estimates": {
                    "rlDisplayEstimations": {"tactics": [{"name": "Native"}]},
                    "socialEstimations": {"configuration": {"type": "FB"}},
                    "videoAdsEstimations": {"configuration": {"marketingObjective": "REACH"}},
                    "searchEstimations": {"budgetEstimates": {"medium": {"budget": 1}}}
                },
                "productSummaries": PRODUCT_BUDGET_COLUMNS
                    .iter()
                    .map(|(_, label)| json!({"productName": label, "productBudget": 5}))
                    .collect::<Vec<_>>(),
                "metadata": {"defaultProposalConfigs": {"goals": ["Calls"]}}
            })))
            .unwrap();
        let columns = transformer.columns();
        assert_eq!(&columns[..3], ["_id", "searchBudget", "platform"]);
        assert_eq!(columns.len(), 2 + 1 + DERIVED_COLUMNS.len() - 1);
        for name in record.keys() {
            assert!(columns.iter().any(|c| c == name), "{name} is not declared");
        }
        for (column, _) in PRODUCT_BUDGET_COLUMNS {
            assert!(DERIVED_COLUMNS.contains(&column));
        }
    }

    #[test]
    fn working_copy_leaves_original_untouched() {
        let original = doc(json!({
            "scores": [{"advertiser": {"isCompetitor": false}, "overallScore": 7}],
            "solutions": [{"name": "Search"}, {"name": "SEO"}],
        }));
        let primary = original["scores"].as_array().unwrap().first();
        let working = working_copy(&original, primary);
        assert_eq!(working["scores"]["overallScore"], json!(7));
        assert_eq!(working["solutions"], json!(["Search", "SEO"]));
        assert!(original["scores"].is_array());
    }

    #[test]
    fn missing_scores_leave_score_empty() {
        let t = transformer(vec![FieldSpec::new("scores_overallScore", FieldKind::Integer)]);
        let record = t.map(&doc(json!({"_id": "p"}))).unwrap();
        assert_eq!(record.get("scores_overallScore"), Some(&RecordValue::empty()));
        assert_eq!(record.get("scores_score"), Some(&RecordValue::empty()));
        assert!(!record.contains("scores_competitorCount"));
    }

    #[test]
    fn radius_locations_describe_distance_from_address() {
        let radius = json!({"type": "RADIUS", "radius": "10 mi", "address": "1 Main St"});
        assert_eq!(describe_location(&radius), "10 mi from 1 Main St");
        let named = json!({"type": "CITY", "name": "Austin, TX"});
        assert_eq!(describe_location(&named), "Austin, TX");
        assert_eq!(describe_location(&json!({"type": "CITY"})), "");
    }

    #[test]
    fn entries_accept_strings_objects_and_null() {
        let custom = json!(["plumber", {"keyword": "drain\nrepair"}, {"other": 1}]);
        assert_eq!(join_entries(Some(&custom), "keyword"), "plumber,drain repair,");
        assert_eq!(join_entries(Some(&json!(null)), "text"), "");
        assert_eq!(join_entries(None, "text"), "");
    }
}
