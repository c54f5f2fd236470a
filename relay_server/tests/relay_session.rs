mod support;

use serde_json::json;
use support::{Client, unique_code};

fn cube(id: &str, owner: &str) -> serde_json::Value {
    json!({
        "id": id,
        "type": "cube",
        "position": { "x": 0.0, "y": 1.0, "z": 0.0 },
        "properties": { "color": 0x3366ff, "scale": 1.0, "isSolid": true },
        "ownerId": owner,
        "createdAt": 0
    })
}

#[tokio::test]
async fn when_a_code_is_in_use_then_the_second_claim_fails() {
    let code = unique_code();
    let mut first = Client::connect().await;
    first.claim(&code).await;

    let mut second = Client::connect().await;
    second.send(json!({ "type": "connect", "code": code })).await;
    let reply = second.recv().await;
    assert_eq!(reply["type"], "connect-error");
}

#[tokio::test]
async fn when_universes_merge_then_objects_flow_both_ways() {
    let (a_code, b_code) = (unique_code(), unique_code());
    let mut a = Client::connect().await;
    a.claim(&a_code).await;
    let mut b = Client::connect().await;
    b.claim(&b_code).await;

    b.send(json!({ "type": "object-add", "code": b_code, "object": cube("b1", "wb") }))
        .await;
    a.send(json!({ "type": "merge-request", "fromCode": a_code, "toCode": b_code }))
        .await;

    let merged = a.recv().await;
    assert_eq!(merged["type"], "merge-objects");
    assert_eq!(merged["fromCode"], b_code.as_str());
    assert_eq!(merged["objects"][0]["id"], "b1");

    let to_b = b.recv().await;
    assert_eq!(to_b["type"], "merge-objects");
    assert_eq!(to_b["fromCode"], a_code.as_str());
    let notice = b.recv().await;
    assert_eq!(notice["type"], "universe-merged");
    assert_eq!(notice["code"], a_code.as_str());

    a.send(json!({
        "type": "object-move",
        "code": a_code,
        "id": "a1",
        "position": { "x": 2.0, "y": 0.0, "z": 0.0 }
    }))
    .await;
    let forwarded = b.recv().await;
    assert_eq!(forwarded["type"], "object-move");
    assert_eq!(forwarded["code"], a_code.as_str());
}

#[tokio::test]
async fn when_a_merged_universe_leaves_then_its_peer_is_told() {
    let (a_code, b_code) = (unique_code(), unique_code());
    let mut a = Client::connect().await;
    a.claim(&a_code).await;
    let mut b = Client::connect().await;
    b.claim(&b_code).await;

    a.send(json!({ "type": "merge-request", "fromCode": a_code, "toCode": b_code }))
        .await;
    assert_eq!(a.recv().await["type"], "merge-objects");
    assert_eq!(b.recv().await["type"], "merge-objects");
    assert_eq!(b.recv().await["type"], "universe-merged");

    a.close().await;
    let gone = b.recv().await;
    assert_eq!(gone["type"], "universe-disconnected");
    assert_eq!(gone["code"], a_code.as_str());
}

#[tokio::test]
async fn when_merging_with_an_unknown_code_then_merge_error() {
    let code = unique_code();
    let mut a = Client::connect().await;
    a.claim(&code).await;

    a.send(json!({ "type": "merge-request", "fromCode": code, "toCode": "NOPE00" }))
        .await;
    assert_eq!(a.recv().await["type"], "merge-error");
}
