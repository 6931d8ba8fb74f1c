use asset_store::network::client::AssetClient;
use asset_store::store::types::InitAssetKey;
use tokio::io::AsyncWriteExt;

use crate::errors::CliErr;
use crate::params::{FetchArgs, UploadArgs};

pub async fn upload(args: UploadArgs) -> Result<(), CliErr> {
    let content = tokio::fs::read(&args.file).await?;
    let name = args
        .file
        .file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .unwrap_or_default();

    let key = InitAssetKey {
        collection: args.collection,
        full_path: args.full_path.unwrap_or_else(|| format!("/{}", name)),
        name,
        description: args.description,
        encoding_type: args.encoding,
        token: args.token,
    };

    let client = AssetClient::new(args.server);
    let batch_id = client
        .upload_asset(&key, &content, args.chunk_size, args.headers)
        .await?;
    tracing::info!(
        "uploaded {} ({} bytes) to {} in batch {}",
        args.file.display(),
        content.len(),
        key.full_path,
        batch_id
    );
    Ok(())
}

pub async fn fetch(args: FetchArgs) -> Result<(), CliErr> {
    let headers = args
        .accept_encoding
        .map(|value| vec![("Accept-Encoding".to_string(), value)])
        .unwrap_or_default();

    let client = AssetClient::new(args.server);
    let (response_headers, body) = client.fetch_asset(&args.url, headers).await?;
    for (name, value) in response_headers.iter() {
        tracing::debug!("{}: {}", name, value);
    }

    match args.output {
        Some(path) => tokio::fs::write(&path, &body).await?,
        None => {
            let mut stdout = tokio::io::stdout();
            stdout.write_all(&body).await?;
            stdout.flush().await?;
        }
    }
    Ok(())
}
