use std::collections::HashMap;
use std::hint::black_box;

use bson::doc;
use criterion::{Criterion, criterion_group, criterion_main};
use slate_index::{DOCUMENT_ID_FIELD, PostingField, PostingsDocument};
use slate_query::{
    DocumentFields, FieldToFetch, FieldsToFetch, IndexQuery, ProjectionBehavior, QueryField,
};
use slate_retriever::{
    CancellationToken, DocumentLoader, RetrievedDocument, Retriever, RetrieverConfig,
    RetrieverInput, StorageError,
};

const ORDERS: usize = 1_000;
const COMPANIES: usize = 20;

struct Store(HashMap<String, RetrievedDocument>);

impl DocumentLoader for Store {
    fn get(
        &self,
        lower_id: &str,
        _fields: DocumentFields,
        _token: &CancellationToken,
    ) -> Result<Option<RetrievedDocument>, StorageError> {
        Ok(self.0.get(lower_id).cloned())
    }
}

fn store() -> Store {
    let mut docs = HashMap::new();
    for i in 0..COMPANIES {
        let id = format!("companies/{i}");
        docs.insert(
            id.clone(),
            RetrievedDocument::new(id, doc! { "Name": format!("Company {i}") }),
        );
    }
    for i in 0..ORDERS {
        let id = format!("orders/{i}");
        let data = doc! {
            "Company": format!("companies/{}", i % COMPANIES),
            "Total": i as f64 * 1.5,
            "Lines": [{ "Product": "ball" }, { "Product": "bat" }],
        };
        docs.insert(id.clone(), RetrievedDocument::new(id, data));
    }
    Store(docs)
}

fn entries() -> Vec<PostingsDocument> {
    (0..ORDERS)
        .map(|i| {
            PostingsDocument::new()
                .with(PostingField::untokenized(DOCUMENT_ID_FIELD, format!("orders/{i}")))
                .with(PostingField::text("Total", format!("{}", i as f64 * 1.5)))
        })
        .collect()
}

fn run(c: &mut Criterion, name: &str, plan: &FieldsToFetch) {
    let store = store();
    let entries = entries();
    let query = IndexQuery::default();
    let token = CancellationToken::new();

    c.bench_function(name, |b| {
        b.iter(|| {
            let mut retriever = Retriever::new(&store, &query, plan, RetrieverConfig::default());
            for entry in &entries {
                black_box(
                    retriever
                        .get(RetrieverInput::postings(entry), &token)
                        .unwrap(),
                );
            }
            retriever.clear_cache();
        })
    });
}

fn bench_whole_documents(c: &mut Criterion) {
    run(c, "retrieve_whole_documents", &FieldsToFetch::none());
}

fn bench_index_projection(c: &mut Criterion) {
    let plan = FieldsToFetch::new(
        vec![FieldToFetch::new("Total").from_index()],
        ProjectionBehavior::Default,
    )
    .unwrap();
    run(c, "project_from_index", &plan);
}

fn bench_load_projection(c: &mut Criterion) {
    let plan = FieldsToFetch::new(
        vec![
            FieldToFetch::new("Lines[].Product").projected("Products"),
            FieldToFetch::new("Name")
                .projected("Company")
                .query(QueryField::field().source("Company")),
        ],
        ProjectionBehavior::Default,
    )
    .unwrap();
    run(c, "project_with_load", &plan);
}

criterion_group!(
    benches,
    bench_whole_documents,
    bench_index_projection,
    bench_load_projection
);
criterion_main!(benches);
