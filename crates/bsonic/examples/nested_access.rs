//! Example of building a document and reading nested fields back out.
//!
//! cargo run --package bsonic --example nested_access

use bsonic::{Bson, Document};

fn main() -> Result<(), bsonic::Error> {
    let amy = Document::from_pairs([("name", Bson::from("Amy"))])?;
    let bob = Document::from_pairs([("name", Bson::from("Bob"))])?;

    let mut doc = Document::new();
    doc.set("users", vec![Bson::Document(amy), Bson::Document(bob)])?;

    // node = root["users"]
    let Some(Bson::Array(users)) = doc.get("users")? else {
        panic!()
    };

    // node = root["users"][1]
    let Bson::Document(user) = &users[1] else {
        panic!()
    };

    // node = root["users"][1]["name"]
    let Some(name) = user.get_str("name")? else {
        panic!()
    };

    println!("{name}");
    println!("{doc}");
    Ok(())
}
