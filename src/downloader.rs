use crate::error::Result;
use crate::models::Picture;
use crate::storage::StorageManager;
use crate::utils::{http_do, HttpClient};
use futures::future::join_all;
use futures::StreamExt;
use tokio::fs::File;
use tokio::io::AsyncWriteExt;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info};

/// Fixed-size pool of workers draining one shared picture stream.
#[derive(Clone)]
pub struct DownloadPool {
    http_client: HttpClient,
    storage: StorageManager,
    worker_count: usize,
}

struct Worker {
    id: usize,
    http_client: HttpClient,
    storage: StorageManager,
    token: CancellationToken,
    pictures: async_channel::Receiver<Picture>,
}

impl DownloadPool {
    pub fn new(http_client: HttpClient, storage: StorageManager, worker_count: usize) -> Self {
        Self {
            http_client,
            storage,
            worker_count: worker_count.max(1),
        }
    }

    pub fn worker_count(&self) -> usize {
        self.worker_count
    }

    /// Run every worker until the stream closes or the token fires, and
    /// return how many pictures were saved.
    pub async fn run(&self, token: CancellationToken, pictures: async_channel::Receiver<Picture>) -> usize {
        let tasks: Vec<_> = (0..self.worker_count)
            .map(|id| {
                let worker = Worker {
                    id,
                    http_client: self.http_client.clone(),
                    storage: self.storage.clone(),
                    token: token.clone(),
                    pictures: pictures.clone(),
                };
                tokio::spawn(worker.run())
            })
            .collect();
        drop(pictures);

        let mut downloaded = 0;
        for (id, result) in join_all(tasks).await.into_iter().enumerate() {
            match result {
                Ok(count) => downloaded += count,
                Err(e) => error!("Download worker {} failed: {}", id, e),
            }
        }

        debug!("All {} download workers finished", self.worker_count);
        downloaded
    }
}

impl Worker {
    async fn run(self) -> usize {
        if let Err(e) = self.storage.ensure_output_dir().await {
            error!(
                "[worker {}] unable to create download directory {:?}: {}",
                self.id,
                self.storage.output_dir(),
                e
            );
            return 0;
        }

        let mut downloaded = 0;
        loop {
            let picture = tokio::select! {
                biased;
                _ = self.token.cancelled() => break,
                next = self.pictures.recv() => match next {
                    Ok(picture) => picture,
                    Err(_) => break,
                },
            };
            if self.token.is_cancelled() {
                break;
            }

            let path = self.storage.picture_path(&picture);
            let file = match File::create(&path).await {
                Ok(file) => file,
                Err(e) => {
                    error!("[worker {}] unable to create file {:?}: {}", self.id, path, e);
                    continue;
                }
            };

            match self.fetch_into(&picture.url, file).await {
                Ok(bytes) => {
                    downloaded += 1;
                    info!("Downloaded {:?} ({} bytes)", path, bytes);
                }
                Err(e) if e.is_cancelled() => {
                    debug!("[worker {}] cancelled while downloading {:?}", self.id, path);
                    break;
                }
                Err(e) => error!("[worker {}] unable to download {}: {}", self.id, picture.url, e),
            }
        }

        debug!("[worker {}] exiting after {} downloads", self.id, downloaded);
        downloaded
    }

    /// Stream the body at `url` into `file`. The file is closed when the
    /// background round trip ends, whatever the outcome.
    async fn fetch_into(&self, url: &str, file: File) -> Result<u64> {
        let client = self.http_client.clone();
        let url = url.to_string();

        http_do(&self.token, async move {
            let mut file = file;
            let response = client.get_raw(&url).await?;

            let mut written = 0u64;
            let mut body = response.bytes_stream();
            while let Some(chunk) = body.next().await {
                let chunk = chunk?;
                file.write_all(&chunk).await?;
                written += chunk.len() as u64;
            }
            file.flush().await?;

            Ok(written)
        })
        .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::HttpConfig;
    use std::time::Duration;

    fn client() -> HttpClient {
        HttpClient::new(&HttpConfig::default()).unwrap()
    }

    async fn feed(pictures: Vec<Picture>) -> async_channel::Receiver<Picture> {
        let (tx, rx) = async_channel::bounded(pictures.len().max(1));
        for picture in pictures {
            tx.send(picture).await.unwrap();
        }
        rx
    }

    fn file_count(dir: &std::path::Path) -> usize {
        std::fs::read_dir(dir).unwrap().count()
    }

    #[tokio::test]
    async fn more_pictures_than_workers_all_land() {
        let mut server = mockito::Server::new_async().await;
        let _img = server
            .mock("GET", mockito::Matcher::Regex(r"^/img/\d+$".to_string()))
            .with_body("jpeg-bytes")
            .expect(7)
            .create_async()
            .await;

        let dir = tempfile::tempdir().unwrap();
        let out = dir.path().join("download");
        let pictures = (0..7)
            .map(|i| Picture::new(format!("{}/img/{}", server.url(), i), format!("Picture {}", i), i.to_string()))
            .collect();

        let pool = DownloadPool::new(client(), StorageManager::new(&out, 64), 3);
        let downloaded = pool.run(CancellationToken::new(), feed(pictures).await).await;

        assert_eq!(downloaded, 7);
        assert_eq!(file_count(&out), 7);
        assert_eq!(std::fs::read(out.join("Picture 3_3.jpeg")).unwrap(), b"jpeg-bytes");
    }

    #[tokio::test]
    async fn equal_captions_keep_both_files() {
        let mut server = mockito::Server::new_async().await;
        let _a = server.mock("GET", "/a").with_body("first").create_async().await;
        let _b = server.mock("GET", "/b").with_body("second").create_async().await;

        let dir = tempfile::tempdir().unwrap();
        let pictures = vec![
            Picture::new(format!("{}/a", server.url()), "Concept Art", "1"),
            Picture::new(format!("{}/b", server.url()), "Concept Art", "2"),
        ];

        let pool = DownloadPool::new(client(), StorageManager::new(dir.path(), 64), 2);
        assert_eq!(pool.run(CancellationToken::new(), feed(pictures).await).await, 2);

        assert_eq!(std::fs::read(dir.path().join("Concept Art_1.jpeg")).unwrap(), b"first");
        assert_eq!(std::fs::read(dir.path().join("Concept Art_2.jpeg")).unwrap(), b"second");
    }

    #[tokio::test]
    async fn long_caption_is_truncated_and_saved() {
        let mut server = mockito::Server::new_async().await;
        let _img = server.mock("GET", "/long").with_body("data").create_async().await;

        let dir = tempfile::tempdir().unwrap();
        let caption = "A".repeat(150);
        let pictures = vec![Picture::new(format!("{}/long", server.url()), caption, "9")];

        let pool = DownloadPool::new(client(), StorageManager::new(dir.path(), 64), 1);
        assert_eq!(pool.run(CancellationToken::new(), feed(pictures).await).await, 1);

        let expected = format!("{}_9.jpeg", "A".repeat(64));
        assert!(dir.path().join(expected).is_file());
    }

    #[tokio::test]
    async fn emoji_caption_longer_than_the_limit_is_saved() {
        let mut server = mockito::Server::new_async().await;
        let _img = server.mock("GET", "/rocket").with_body("data").create_async().await;

        let dir = tempfile::tempdir().unwrap();
        let caption = "\u{1F680}".repeat(100);
        let pictures = vec![Picture::new(format!("{}/rocket", server.url()), caption, "3")];

        let pool = DownloadPool::new(client(), StorageManager::new(dir.path(), 64), 1);
        assert_eq!(pool.run(CancellationToken::new(), feed(pictures).await).await, 1);

        let expected = format!("{}_3.jpeg", "\u{1F680}".repeat(16));
        assert!(dir.path().join(expected).is_file());
        assert_eq!(file_count(dir.path()), 1);
    }

    #[tokio::test]
    async fn failed_fetch_does_not_stop_the_worker() {
        let mut server = mockito::Server::new_async().await;
        let _bad = server.mock("GET", "/bad").with_status(404).create_async().await;
        let _good = server.mock("GET", "/good").with_body("ok").create_async().await;

        let dir = tempfile::tempdir().unwrap();
        let pictures = vec![
            Picture::new(format!("{}/bad", server.url()), "bad", "1"),
            Picture::new(format!("{}/good", server.url()), "good", "2"),
        ];

        let pool = DownloadPool::new(client(), StorageManager::new(dir.path(), 64), 1);
        assert_eq!(pool.run(CancellationToken::new(), feed(pictures).await).await, 1);

        // The failed picture's file was created before the fetch and stays.
        assert!(dir.path().join("bad_1.jpeg").is_file());
        assert_eq!(std::fs::read(dir.path().join("good_2.jpeg")).unwrap(), b"ok");
    }

    #[tokio::test]
    async fn unusable_output_dir_ends_workers_quietly() {
        let dir = tempfile::tempdir().unwrap();
        let blocker = dir.path().join("download");
        std::fs::write(&blocker, b"file").unwrap();

        let pictures = vec![Picture::new("http://127.0.0.1:9/x", "x", "1")];
        let pool = DownloadPool::new(client(), StorageManager::new(&blocker, 64), 2);

        assert_eq!(pool.run(CancellationToken::new(), feed(pictures).await).await, 0);
    }

    #[tokio::test]
    async fn cancelled_pool_takes_no_work() {
        let dir = tempfile::tempdir().unwrap();
        let token = CancellationToken::new();
        token.cancel();

        let pictures = vec![Picture::new("http://127.0.0.1:9/x", "x", "1")];
        let pool = DownloadPool::new(client(), StorageManager::new(dir.path(), 64), 3);

        assert_eq!(pool.run(token, feed(pictures).await).await, 0);
        assert_eq!(file_count(dir.path()), 0);
    }

    #[tokio::test]
    async fn idle_workers_exit_when_the_stream_closes() {
        let dir = tempfile::tempdir().unwrap();
        let (tx, rx) = async_channel::bounded::<Picture>(1);

        let pool = DownloadPool::new(client(), StorageManager::new(dir.path(), 64), 4);
        let run = tokio::spawn({
            let pool = pool.clone();
            async move { pool.run(CancellationToken::new(), rx).await }
        });

        tokio::time::sleep(Duration::from_millis(20)).await;
        drop(tx);

        let downloaded = tokio::time::timeout(Duration::from_secs(2), run)
            .await
            .expect("workers should exit once the stream closes")
            .unwrap();
        assert_eq!(downloaded, 0);
    }

    #[test]
    fn zero_workers_is_clamped() {
        let pool = DownloadPool::new(client(), StorageManager::new("download", 64), 0);
        assert_eq!(pool.worker_count(), 1);
    }
}
