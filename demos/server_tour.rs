//! Calls every endpoint of a running llama.cpp server and prints the results.
//!
//! Start a server first, e.g. `llama-server -m model.gguf --jinja --props --metrics`,
//! then run with `LLAMA_SERVER_URL` pointing at it. Endpoints the server does
//! not enable report their error and the tour moves on.

use std::io::Write;

use futures::StreamExt;
use itertools::Itertools;
use schemars::JsonSchema;
use serde::Deserialize;
use serde_json::json;
use tracing_subscriber::EnvFilter;

use llama_server_client::api::completion::CompletionRequest;
use llama_server_client::api::embedding::{EmbeddingRequest, RerankRequest};
use llama_server_client::api::openai::{
    ChatCompletionRequest, EmbeddingsRequest, OaiCompletionRequest, ResponseFormat, Tool, ToolChoice,
};
use llama_server_client::api::server::{LoraAdapterScale, PropsUpdate};
use llama_server_client::api::tokenize::{ApplyTemplateRequest, DetokenizeRequest, TokenizeRequest};
use llama_server_client::model::{ContentPart, Message};
use llama_server_client::{ClientError, LlamaClient};

/// 1x1 red PNG.
const RED_PIXEL_PNG: &str =
    "iVBORw0KGgoAAAANSUhEUgAAAAEAAAABCAYAAAAfFcSJAAAADUlEQVR42mP8z8DwHwAFBQIAX8jx0gAAAABJRU5ErkJggg==";

#[derive(Debug, Deserialize, JsonSchema)]
#[allow(dead_code)]
struct Answer {
    answer: String,
    confidence: f32,
}

fn report<T: std::fmt::Debug>(name: &str, result: Result<T, ClientError>) {
    match result {
        Ok(value) => println!("{name}: {value:?}"),
        Err(err) => println!("{name} failed: {err}"),
    }
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    let client = LlamaClient::from_env()?;
    println!("Using {}", client.transport_options().base_url);

    report("health", client.health().await);

    // --- Native completion ---
    let completion = CompletionRequest::new("Building a website can be done in 10 simple steps:")
        .with_n_predict(48)
        .with_temperature(0.7);
    match client.completion(&completion).await {
        Ok(response) => println!("completion: {:?} ({:?})", response.content, response.stop_type),
        Err(err) => println!("completion failed: {err}"),
    }

    println!("completion_stream:");
    match client.completion_stream(&completion).await {
        Ok(mut stream) => {
            while let Some(chunk) = stream.next().await {
                match chunk {
                    Ok(chunk) => {
                        print!("{}", chunk.content);
                        std::io::stdout().flush()?;
                    }
                    Err(err) => {
                        println!("\nstream failed: {err}");
                        break;
                    }
                }
            }
            println!();
        }
        Err(err) => println!("failed: {err}"),
    }

    // --- Tokenizer ---
    let tokenize = TokenizeRequest::new("Hello world!").with_add_special(true);
    match client.tokenize(&tokenize).await {
        Ok(tokens) => {
            println!("tokenize: [{}]", tokens.iter().join(", "));
            report("detokenize", client.detokenize(&DetokenizeRequest::new(tokens)).await);
        }
        Err(err) => println!("tokenize failed: {err}"),
    }
    match client.tokenize_with_pieces(&tokenize).await {
        Ok(pieces) => println!(
            "tokenize_with_pieces: {}",
            pieces
                .iter()
                .map(|t| format!("{}={:?}", t.id, String::from_utf8_lossy(t.piece.as_bytes())))
                .join(" ")
        ),
        Err(err) => println!("tokenize_with_pieces failed: {err}"),
    }

    let messages = vec![
        Message::system("You are a helpful assistant."),
        Message::user("What is the capital of France?"),
    ];
    report(
        "apply_template",
        client
            .apply_template(&ApplyTemplateRequest::new(messages.clone()))
            .await
            .map(|r| r.prompt),
    );

    // --- Embeddings and reranking ---
    report(
        "embedding",
        client
            .embedding(&EmbeddingRequest::new("Hello world!"))
            .await
            .map(|r| r.iter().map(|e| e.embedding.first().map_or(0, Vec::len)).collect::<Vec<_>>()),
    );

    let rerank = RerankRequest::new(
        "What is panda?",
        vec![
            "hi".to_string(),
            "it is a bear".to_string(),
            "The giant panda is a bear species endemic to China.".to_string(),
        ],
    );
    match client.rerank(&rerank).await {
        Ok(response) => {
            for result in response.ranked() {
                println!("rerank: #{} {:.3}", result.index, result.relevance_score);
            }
        }
        Err(err) => println!("rerank failed: {err}"),
    }

    // --- Server management ---
    report("props", client.props().await.map(|p| p.build_info));
    report(
        "set_props",
        client
            .set_props(&PropsUpdate::default().with_chat_template("chatml"))
            .await,
    );
    report(
        "metrics",
        client
            .metrics()
            .await
            .map(|m| m.get("llamacpp:prompt_tokens_total")),
    );
    match client.lora_adapters().await {
        Ok(adapters) => {
            println!("lora_adapters: {adapters:?}");
            let scales: Vec<LoraAdapterScale> = adapters
                .iter()
                .map(|a| LoraAdapterScale { id: a.id, scale: 0.5 })
                .collect();
            report("set_lora_adapters", client.set_lora_adapters(&scales).await);
        }
        Err(err) => println!("lora_adapters failed: {err}"),
    }

    // --- OpenAI-compatible ---
    report(
        "models",
        client
            .models()
            .await
            .map(|m| m.data.into_iter().map(|info| info.id).collect::<Vec<_>>()),
    );

    let oai = OaiCompletionRequest::new("The sky is blue because").with_max_tokens(32);
    report(
        "oai_completion",
        client
            .oai_completion(&oai)
            .await
            .map(|r| r.first_choice().text.clone()),
    );
    match client.oai_completion_stream(&oai).await {
        Ok(stream) => {
            let text: String = stream
                .filter_map(|chunk| async move { chunk.ok()?.first_choice().map(|c| c.text.clone()) })
                .collect()
                .await;
            println!("oai_completion_stream: {text:?}");
        }
        Err(err) => println!("oai_completion_stream failed: {err}"),
    }

    let chat = ChatCompletionRequest::new(messages.clone()).with_max_completion_tokens(64);
    report(
        "chat_completion",
        client
            .chat_completion(&chat)
            .await
            .map(|r| r.first_choice().message.text().map(str::to_string)),
    );

    println!("chat_completion_stream:");
    match client.chat_completion_stream(&chat).await {
        Ok(mut stream) => {
            while let Some(chunk) = stream.next().await {
                match chunk {
                    Ok(chunk) => {
                        print!("{}", chunk.delta_content().unwrap_or_default());
                        std::io::stdout().flush()?;
                    }
                    Err(err) => {
                        println!("\nstream failed: {err}");
                        break;
                    }
                }
            }
            println!();
        }
        Err(err) => println!("failed: {err}"),
    }

    let structured = ChatCompletionRequest::new(messages.clone())
        .with_response_format(ResponseFormat::json_schema_for::<Answer>()?);
    match client.chat_completion(&structured).await {
        Ok(response) => {
            let parsed = response
                .first_choice()
                .message
                .text()
                .map(serde_json::from_str::<Answer>);
            println!("structured: {parsed:?}");
        }
        Err(err) => println!("structured failed: {err}"),
    }

    // Structured output arrives in pieces too; parse once the stream ends.
    match client.chat_completion_stream(&structured).await {
        Ok(stream) => {
            let chunks: Vec<_> = stream.collect().await;
            let text: Result<String, ClientError> = chunks
                .into_iter()
                .map(|chunk| chunk.map(|c| c.delta_content().unwrap_or_default().to_string()))
                .collect();
            match text {
                Ok(text) => println!("structured stream: {:?}", serde_json::from_str::<Answer>(&text)),
                Err(err) => println!("structured stream failed: {err}"),
            }
        }
        Err(err) => println!("structured stream failed: {err}"),
    }

    let weather = Tool::function(
        "get_weather",
        "Get the current weather for a city",
        json!({
            "type": "object",
            "properties": {"city": {"type": "string"}},
            "required": ["city"]
        }),
    );
    let tools = ChatCompletionRequest::new(vec![Message::user("What's the weather in Paris?")])
        .with_tools(vec![weather])
        .with_tool_choice(ToolChoice::Auto);
    report(
        "tool calls",
        client
            .chat_completion(&tools)
            .await
            .map(|r| r.first_choice().message.tool_calls.clone()),
    );

    // Needs a vision model loaded with its `--mmproj`.
    let vision = ChatCompletionRequest::new(vec![Message::user_parts(vec![
        ContentPart::text("What colour is this image?"),
        ContentPart::image_url(format!("data:image/png;base64,{RED_PIXEL_PNG}")),
    ])])
    .with_max_completion_tokens(32);
    report(
        "multimodal",
        client
            .chat_completion(&vision)
            .await
            .map(|r| r.first_choice().message.text().map(str::to_string)),
    );

    let embeddings = EmbeddingsRequest::new(vec!["hello".to_string(), "world".to_string()]);
    report(
        "embeddings_float",
        client
            .embeddings_float(&embeddings)
            .await
            .map(|r| r.data.iter().map(|d| d.embedding.len()).collect::<Vec<_>>()),
    );
    match client.embeddings_base64(&embeddings).await {
        Ok(response) => {
            for data in &response.data {
                report("embeddings_base64", data.decode().map(|v| v.len()));
            }
        }
        Err(err) => println!("embeddings_base64 failed: {err}"),
    }

    Ok(())
}
