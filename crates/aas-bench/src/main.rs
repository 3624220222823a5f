//! Benchmark for submodel encoding and path lookup using a synthetic plant.
//!
//! Builds one Collection per machine, each holding scalar properties, a
//! reading List, a multi-language description and an Entity.

use std::time::{Duration, Instant};

use aas_model::codec::{
    decode_submodel_with_options, decode_submodel_xml, encode_submodel_with_options,
    encode_submodel_xml,
};
use aas_model::model::{EntityType, LangStringSet, Qualifier, Reference};
use aas_model::{
    DecodeOptions, ElementTree, EncodeOptions, PrimitiveValue, Submodel, SubmodelElement,
};
use tracing::info;

const DEFAULT_MACHINES: usize = 2_000;
const READINGS_PER_MACHINE: usize = 16;

fn machine(index: usize) -> SubmodelElement {
    let description = LangStringSet::new()
        .with("en", format!("Machine number {}", index))
        .with("de", format!("Maschine Nummer {}", index));

    SubmodelElement::collection(format!("Machine{}", index), |c| {
        c.property("SerialNumber", format!("SN-{:06}", index))
            .property("Speed", 1_500.0 + index as f64 / 4.0)
            .property("Running", index % 3 != 0)
            .property("Starts", index as i64 * 17)
            .element(SubmodelElement::multi_language("Label", description))
            .list("Readings", |mut l| {
                for r in 0..READINGS_PER_MACHINE {
                    l = l.value((index * READINGS_PER_MACHINE + r) as f64 * 0.5);
                }
                l
            })
            .element(SubmodelElement::entity(
                "Motor",
                EntityType::SelfManagedEntity,
                |s| {
                    s.property("Vendor", "ACME")
                        .property("RatedPower", 7.5)
                        .collection("Nameplate", |n| {
                            n.property("Year", 2020 + (index % 5) as i32)
                        })
                },
            ))
    })
    .with_semantic_id(Reference::global("urn:example:machine:1:0"))
    .with_qualifier(Qualifier::new("line", PrimitiveValue::from(format!("L{}", index % 8))))
}

fn plant(machines: usize) -> Submodel {
    (0..machines).fold(
        Submodel::new("urn:example:submodel:plant").with_id_short("Plant"),
        |sm, i| sm.with_element(machine(i)),
    )
}

fn report(label: &str, bytes: usize, elapsed: Duration) {
    println!(
        "{:<24} {:>12} bytes in {:>12?}  ({:.2} MB/s)",
        label,
        bytes,
        elapsed,
        (bytes as f64 / 1_000_000.0) / elapsed.as_secs_f64()
    );
}

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive(tracing::Level::WARN.into()),
        )
        .init();

    let machines = std::env::args()
        .nth(1)
        .and_then(|n| n.parse().ok())
        .unwrap_or(DEFAULT_MACHINES);

    let build_start = Instant::now();
    let submodel = plant(machines);
    let tree = ElementTree::from_submodel(submodel.clone()).expect("Failed to build tree");
    let build_time = build_start.elapsed();
    info!(machines, nodes = tree.len(), "built plant submodel");
    println!(
        "Built {} machines ({} nodes) in {:?}\n",
        machines,
        tree.len(),
        build_time
    );

    // JSON, one run per projection
    let projections = [
        ("JSON Full", EncodeOptions::new()),
        ("JSON Metadata", EncodeOptions::metadata()),
        ("JSON Value", EncodeOptions::value_only()),
        ("JSON Path", EncodeOptions::path_only()),
    ];
    let mut full_json = String::new();
    for (label, options) in projections {
        let start = Instant::now();
        let text = encode_submodel_with_options(&submodel, &options).expect("Failed to encode");
        report(label, text.len(), start.elapsed());
        if full_json.is_empty() {
            full_json = text;
        }
    }

    let decode_start = Instant::now();
    let decoded = decode_submodel_with_options(&full_json, &DecodeOptions::new())
        .expect("Failed to decode JSON");
    report("JSON Full decode", full_json.len(), decode_start.elapsed());
    assert_eq!(decoded, submodel, "JSON round trip should be lossless");

    // XML
    let xml_start = Instant::now();
    let xml = encode_submodel_xml(&submodel, &EncodeOptions::new()).expect("Failed to encode XML");
    report("XML Full", xml.len(), xml_start.elapsed());

    let xml_meta_start = Instant::now();
    let xml_meta =
        encode_submodel_xml(&submodel, &EncodeOptions::metadata()).expect("Failed to encode XML");
    report("XML Metadata", xml_meta.len(), xml_meta_start.elapsed());

    let xml_decode_start = Instant::now();
    let decoded =
        decode_submodel_xml(&xml, &DecodeOptions::new()).expect("Failed to decode XML");
    report("XML Full decode", xml.len(), xml_decode_start.elapsed());
    assert_eq!(decoded, submodel, "XML round trip should be lossless");

    // Path lookup
    let paths: Vec<String> = (0..machines)
        .map(|i| format!("Machine{}.Readings[{}]", i, i % READINGS_PER_MACHINE))
        .collect();
    let lookup_start = Instant::now();
    let found = paths.iter().filter(|p| tree.get_child(p).is_some()).count();
    let lookup_time = lookup_start.elapsed();
    println!(
        "\nResolved {}/{} paths in {:?} ({:.0} ns/lookup)",
        found,
        paths.len(),
        lookup_time,
        lookup_time.as_nanos() as f64 / paths.len().max(1) as f64
    );
}
