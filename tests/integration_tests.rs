// Integration tests for the Tabletop Recs tool server

use std::sync::Arc;

use serde_json::{json, Value};
use tabletop_recs::core::Recommender;
use tabletop_recs::models::{Category, Designer, Game};
use tabletop_recs::routes::ToolRegistry;
use tabletop_recs::server::{ToolServer, METHOD_NOT_FOUND, PARSE_ERROR, TOOL_ERROR};
use tabletop_recs::services::MemoryStore;
use tokio::io::BufReader;

fn create_game(g_id: i64, name: &str, numvotes: i64, c_ids: &[i64], des_ids: &[i64]) -> Game {
    Game {
        avgscore: Some(6.5 + (g_id % 3) as f64 * 0.5),
        numvotes: Some(numvotes),
        minplayers: Some(1),
        maxplayers: Some(5),
        minplaytime: Some(30),
        maxplaytime: Some(120),
        categories: c_ids
            .iter()
            .map(|&c_id| Category { c_id, name: format!("Category {}", c_id) })
            .collect(),
        designers: des_ids
            .iter()
            .map(|&des_id| Designer { des_id, name: format!("Designer {}", des_id), country: None })
            .collect(),
        ..Game::new(g_id, name)
    }
}

fn create_recommender() -> Recommender {
    let store = MemoryStore::new()
        .with_game(create_game(1, "Terraforming Mars", 90_000, &[1, 2], &[10]))
        .with_game(create_game(2, "Ark Nova", 40_000, &[1, 2], &[11]))
        .with_game(create_game(3, "Gaia Project", 25_000, &[1, 3], &[12]))
        .with_game(create_game(4, "Underwater Cities", 15_000, &[2], &[13]))
        .with_game(create_game(5, "Mars Open", 300, &[1], &[10]));
    Recommender::new(Arc::new(store))
}

/// Feed `input` through the loop and decode every response line
async fn run_session(input: &str) -> Vec<Value> {
    let registry = ToolRegistry::standard();
    let recommender = create_recommender();
    let server = ToolServer::new(&registry, &recommender);

    let mut output = Vec::new();
    server.serve(input.as_bytes(), &mut output).await.unwrap();

    String::from_utf8(output)
        .unwrap()
        .lines()
        .map(|line| serde_json::from_str(line).unwrap())
        .collect()
}

fn call(id: Value, name: &str, arguments: Value) -> String {
    json!({
        "jsonrpc": "2.0",
        "id": id,
        "method": "tools/call",
        "params": {"name": name, "arguments": arguments}
    })
    .to_string()
}

#[tokio::test]
async fn test_tools_list_is_stable() {
    let registry = ToolRegistry::standard();
    let recommender = create_recommender();
    let server = ToolServer::new(&registry, &recommender);

    let request = r#"{"jsonrpc":"2.0","id":1,"method":"tools/list"}"#;
    let input = format!("{}\n{}\n", request, request.replace("\"id\":1", "\"id\":2"));

    let mut output = Vec::new();
    let handled = server.serve(input.as_bytes(), &mut output).await.unwrap();
    assert_eq!(handled, 2);

    let text = String::from_utf8(output).unwrap();
    let lines: Vec<&str> = text.lines().collect();
    let first: Value = serde_json::from_str(lines[0]).unwrap();
    let second: Value = serde_json::from_str(lines[1]).unwrap();

    assert_eq!(
        serde_json::to_string(&first["result"]).unwrap(),
        serde_json::to_string(&second["result"]).unwrap()
    );

    let tools = first["result"].as_array().unwrap();
    assert_eq!(tools.len(), 10);
    for tool in tools {
        assert!(tool["name"].is_string());
        assert!(tool["description"].is_string());
        assert_eq!(tool["inputSchema"]["type"], "object");
    }
}

#[tokio::test]
async fn test_unknown_tool_then_recovery() {
    let input = format!(
        "{}\n{}\n",
        call(json!("req-7"), "teleport", json!({})),
        call(json!(8), "get_game_profile", json!({"g_id": 3}))
    );
    let responses = run_session(&input).await;

    assert_eq!(responses.len(), 2);
    assert_eq!(responses[0]["id"], "req-7");
    assert_eq!(responses[0]["error"]["code"], METHOD_NOT_FOUND);
    assert_eq!(responses[0]["error"]["message"], "Unknown tool: teleport");

    assert_eq!(responses[1]["id"], 8);
    assert_eq!(responses[1]["result"]["name"], "Gaia Project");
    assert!(responses[1].get("error").is_none());
}

#[tokio::test]
async fn test_protocol_errors_keep_loop_alive() {
    let input = format!(
        "this is not json\n\n   \n{}\n{}\n{}\n",
        r#"{"jsonrpc":"2.0","id":3,"method":"resources/list"}"#,
        call(json!(4), "score_candidates", json!({"candidates": "nope", "constraints": {}, "exclude_g_ids": []})),
        r#"{"jsonrpc":"2.0","id":5,"method":"tools/list"}"#
    );
    let responses = run_session(&input).await;

    assert_eq!(responses.len(), 4);

    assert_eq!(responses[0]["id"], Value::Null);
    assert_eq!(responses[0]["error"]["code"], PARSE_ERROR);
    assert_eq!(responses[0]["error"]["data"]["line"], "this is not json");

    assert_eq!(responses[1]["id"], 3);
    assert_eq!(responses[1]["error"]["code"], METHOD_NOT_FOUND);
    assert_eq!(responses[1]["error"]["message"], "Unknown method: resources/list");

    assert_eq!(responses[2]["id"], 4);
    assert_eq!(responses[2]["error"]["code"], TOOL_ERROR);
    assert_eq!(responses[2]["error"]["message"], "Tool error");
    assert!(responses[2]["error"]["data"]["error"].is_string());

    assert_eq!(responses[3]["id"], 5);
    assert!(responses[3]["result"].is_array());
}

#[tokio::test]
async fn test_recommendation_workflow() {
    let input = [
        call(json!(1), "get_games_by_name", json!({"name_query": "mars"})),
        call(json!(2), "candidate_by_categories", json!({"c_ids": [1, 2], "constraints": {}})),
        call(json!(3), "candidate_by_designers", json!({"des_ids": [10], "constraints": {"min_votes": 0}})),
        call(
            json!(4),
            "score_candidates",
            json!({
                "candidates": [{"g_id": 2, "cat_overlap": 2}, {"g_id": 4, "cat_overlap": 1}, 1, 5],
                "constraints": {"limit_final": 2},
                "exclude_g_ids": [1]
            }),
        ),
        call(json!(5), "fetch_game_cards", json!({"g_ids": [4, 999, 2]})),
    ]
    .join("\n");
    let responses = run_session(&input).await;
    assert_eq!(responses.len(), 5);

    let names: Vec<&str> = responses[0]["result"]
        .as_array()
        .unwrap()
        .iter()
        .map(|g| g["name"].as_str().unwrap())
        .collect();
    assert_eq!(names, vec!["Terraforming Mars", "Mars Open"]);

    let category_ids: Vec<i64> = responses[1]["result"]
        .as_array()
        .unwrap()
        .iter()
        .map(|c| c["g_id"].as_i64().unwrap())
        .collect();
    // Mars Open is below the default vote floor
    assert_eq!(category_ids, vec![1, 2, 3, 4]);

    let designer_ids: Vec<i64> = responses[2]["result"]
        .as_array()
        .unwrap()
        .iter()
        .map(|c| c["g_id"].as_i64().unwrap())
        .collect();
    assert_eq!(designer_ids, vec![1, 5]);

    assert_eq!(responses[3]["result"], json!([2, 4]));

    let cards = responses[4]["result"].as_array().unwrap();
    assert_eq!(cards.len(), 2);
    assert_eq!(cards[0]["g_id"], 4);
    assert_eq!(cards[1]["designers"][0]["name"], "Designer 11");
}

#[tokio::test]
async fn test_recommend_similar_tool() {
    let input = call(json!("r"), "recommend_similar", json!({"g_id": 1, "constraints": {"min_votes": 0}}));
    let responses = run_session(&input).await;

    let ids: Vec<i64> = responses[0]["result"]
        .as_array()
        .unwrap()
        .iter()
        .map(|g| g["g_id"].as_i64().unwrap())
        .collect();
    assert!(!ids.contains(&1));
    assert_eq!(ids[0], 2);
}

#[tokio::test]
async fn test_lines_split_across_reads() {
    let registry = ToolRegistry::standard();
    let recommender = create_recommender();
    let server = ToolServer::new(&registry, &recommender);

    let reader = tokio_test::io::Builder::new()
        .read(br#"{"jsonrpc":"2.0","id":1,"me"#)
        .read(b"thod\":\"tools/call\",\"params\":{\"name\":\"search_categories\",\"arguments\":{\"query\":\" 2 \"}}}\n")
        .read(b"{\"jsonrpc\":\"2.0\",\"id\":2,\"method\":\"tools/call\",\"params\":{\"name\":\"search_designers\"}}")
        .build();

    let mut output = Vec::new();
    let handled = server.serve(BufReader::new(reader), &mut output).await.unwrap();
    assert_eq!(handled, 2);

    let text = String::from_utf8(output).unwrap();
    let responses: Vec<Value> = text.lines().map(|l| serde_json::from_str(l).unwrap()).collect();

    assert_eq!(responses[0]["result"], json!([{"c_id": 2, "name": "Category 2"}]));
    assert_eq!(responses[1]["result"].as_array().unwrap().len(), 4);
}
