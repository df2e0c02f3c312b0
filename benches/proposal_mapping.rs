use std::sync::Arc;

use criterion::{BatchSize, Criterion, criterion_group, criterion_main};
use grader_extract::{
    config::Config,
    document::{Document, document_from_json},
    mapper::{RecordMapper, SchemaRecordMapper},
    proposal::ProposalRecordTransformer,
    scan::ScanOptions,
    schema::Schema,
    service::ReportingService,
    sink::MemorySink,
    source::MemorySource,
    stream::Stream,
};
use serde_json::json;

fn proposal_schema() -> Schema {
    Schema::from_value(json!({
        "type": "object",
        "properties": {
            "_id": {"type": ["null", "string"]},
            "advertiser_id": {"type": ["null", "string"]},
            "advertiser_name": {"type": ["null", "string"]},
            "status": {"type": ["null", "string"]},
            "solutions": {"type": ["null", "string"]},
            "scores_overallScore": {"type": ["null", "integer"]},
            "totalBudget": {"type": ["null", "number"]}
        }
    }))
    .expect("bench schema")
}

fn generate_proposals(count: usize) -> Vec<Document> {
    (0..count)
        .map(|i| {
            document_from_json(json!({
                "_id": format!("p{i}"),
                "advertiser": {"_id": format!("a{}", i % 50), "name": format!("Advertiser {i}\nLLC")},
                "status": if i % 2 == 0 { "DRAFT" } else { "SENT" },
                "solutions": [{"name": "Search"}, {"name": "Display"}],
                "scores": [
                    {"advertiser": {"isCompetitor": true}, "overallScore": 4},
                    {"advertiser": {"isCompetitor": false}, "overallScore": i % 10}
                ],
                "estimates": {
                    "searchEstimations": {
                        "campaignName": "Spring",
                        "locations": [
                            {"type": "RADIUS", "radius": "10mi", "address": "Main St"},
                            {"type": "CITY", "name": "Springfield"}
                        ],
                        "budgetEstimates": {"medium": {"budget": 500, "keywordCount": 12}}
                    }
                },
                "productSummaries": [
                    {"productName": "Search Ads", "productBudget": 500},
                    {"productName": "Display Ads", "productBudget": 250}
                ],
                "totalBudget": 750.5
            }))
            .expect("bench document")
        })
        .collect()
}

fn bench_proposal_mapping(c: &mut Criterion) {
    let schema = Arc::new(proposal_schema());
    let documents = generate_proposals(2_000);
    let plain = SchemaRecordMapper::new(Arc::clone(&schema), "grader");
    let transformer = ProposalRecordTransformer::new(SchemaRecordMapper::new(schema, "grader"));

    let mut group = c.benchmark_group("proposal_mapping");
    group.bench_function("schema_mapper", |b| {
        b.iter(|| {
            for document in &documents {
                plain.map(document).expect("map document");
            }
        });
    });
    group.bench_function("proposal_transformer", |b| {
        b.iter(|| {
            for document in &documents {
                transformer.map(document).expect("transform document");
            }
        });
    });
    group.finish();
}

fn bench_partitioned_scan(c: &mut Criterion) {
    let source = MemorySource::new().with_collection("Proposal", generate_proposals(5_000));
    let config = Config::with_platform("grader");

    let mut group = c.benchmark_group("partitioned_scan");
    for workers in [1usize, 4, 10] {
        let service = ReportingService::new(Stream::Proposal, proposal_schema(), &config)
            .with_options(ScanOptions {
                max_workers: workers,
                ..ScanOptions::default()
            });
        group.bench_function(format!("workers_{workers}"), |b| {
            b.iter_batched(
                MemorySink::new,
                |sink| {
                    service.get_reports(&source, &sink).expect("scan proposals");
                },
                BatchSize::SmallInput,
            );
        });
    }
    group.finish();
}

criterion_group!(benches, bench_proposal_mapping, bench_partitioned_scan);
criterion_main!(benches);
