//! Simple inspector for submodel element JSON files.
//!
//! Prints the element's paths and its value-only projection.

use std::fs;

use aas_model::codec::{element_paths, element_value};
use aas_model::{decode_element, validate_element, Depth, SubmodelElement};

fn describe(element: &SubmodelElement) -> String {
    match element.children() {
        Some(children) => format!("{} with {} children", element.model_type(), children.len()),
        None => element.model_type().to_string(),
    }
}

fn main() {
    let path = std::env::args()
        .nth(1)
        .unwrap_or_else(|| "element.json".to_string());

    println!("Reading: {}", path);

    let text = fs::read_to_string(&path).expect("Failed to read file");
    let element = decode_element(&text).expect("Failed to decode");

    println!("\n=== Element ===");
    println!("idShort: {}", element.id_short().unwrap_or("<unnamed>"));
    println!("Kind:    {}", describe(&element));
    println!("Nodes:   {}", element.subtree_len());
    if let Err(e) = validate_element(&element) {
        println!("Invalid: {}", e);
    }

    println!("\n=== Paths ===");
    for p in element_paths(&element, Depth::Deep) {
        println!("  {}", p);
    }

    println!("\n=== Value ===");
    let value = element_value(&element, Depth::Deep);
    println!(
        "{}",
        serde_json::to_string_pretty(&value).expect("Failed to format value")
    );
}
