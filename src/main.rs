#[tokio::main]
async fn main() {
    if let Err(e) = pdf_chat_lib::run().await {
        tracing::error!(error = %e, "pdf-chat failed to start");
        eprintln!("pdf-chat: {e}");
        std::process::exit(1);
    }
}
