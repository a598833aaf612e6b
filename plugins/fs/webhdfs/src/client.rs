use std::future::Future;
use std::pin::Pin;
use std::time::Duration;

use reqwest::header::{CONTENT_TYPE, LOCATION};
use reqwest::{Method, Response, StatusCode, Url};
use sink_api::{DistributedFs, FileStatus, FsError};

use crate::response::{remote_error, BooleanResponse, FileStatusEnvelope, ListEnvelope};

/// WebHDFS REST client (`/webhdfs/v1`), simple auth via `user.name`.
///
/// CREATE, APPEND and OPEN are two-step: the namenode answers with a
/// 307 redirect to a datanode, the payload goes to the redirect target.
/// Redirects are followed manually so the body is sent exactly once.
pub struct WebHdfsClient {
    http: reqwest::Client,
    base_url: Url,
    user: String,
}

impl WebHdfsClient {
    pub fn new(url: &str, user: &str, timeout: Duration) -> Result<Self, FsError> {
        let base_url = Url::parse(&format!("{}/webhdfs/v1", url.trim_end_matches('/')))
            .map_err(|e| FsError::config(format!("HDFS url '{url}': {e}")))?;
        if base_url.cannot_be_a_base() {
            return Err(FsError::config(format!("HDFS url '{url}' cannot be a base")));
        }
        let http = reqwest::Client::builder()
            .redirect(reqwest::redirect::Policy::none())
            .timeout(timeout)
            .build()
            .map_err(|e| FsError::config(format!("HTTP client: {e}")))?;
        Ok(Self {
            http,
            base_url,
            user: user.to_string(),
        })
    }

    /// `<base>/webhdfs/v1/<path>?op=<op>&user.name=<user>`; path segments
    /// are percent-encoded.
    pub fn op_url(&self, path: &str, op: &str, extra: &[(&str, &str)]) -> Result<Url, FsError> {
        let mut url = self.base_url.clone();
        url.path_segments_mut()
            .map_err(|_| FsError::config(format!("HDFS url '{}' cannot be a base", self.base_url)))?
            .extend(path.split('/').filter(|s| !s.is_empty()));
        {
            let mut query = url.query_pairs_mut();
            query.append_pair("op", op);
            query.append_pair("user.name", &self.user);
            for (k, v) in extra {
                query.append_pair(k, v);
            }
        }
        Ok(url)
    }

    async fn send(&self, method: Method, url: Url, path: &str) -> Result<Response, FsError> {
        self.http
            .request(method, url)
            .send()
            .await
            .map_err(|e| FsError::io(format!("{path}: request: {e}")))
    }

    /// Первый шаг двухшаговой операции: получить адрес datanode.
    async fn locate(&self, method: Method, url: Url, path: &str) -> Result<Url, FsError> {
        let resp = check(self.send(method, url, path).await?, path).await?;
        let location = resp
            .headers()
            .get(LOCATION)
            .and_then(|v| v.to_str().ok())
            .ok_or_else(|| FsError::protocol(format!("{path}: namenode sent no datanode redirect")))?;
        Url::parse(location).map_err(|e| FsError::protocol(format!("{path}: bad redirect '{location}': {e}")))
    }

    async fn upload(&self, method: Method, url: Url, path: &str, data: &[u8]) -> Result<(), FsError> {
        let location = self.locate(method.clone(), url, path).await?;
        let resp = self
            .http
            .request(method, location)
            .header(CONTENT_TYPE, "application/octet-stream")
            .body(data.to_vec())
            .send()
            .await
            .map_err(|e| FsError::io(format!("{path}: datanode request: {e}")))?;
        check(resp, path).await?;
        Ok(())
    }

    async fn do_status(&self, path: &str) -> Result<Option<FileStatus>, FsError> {
        let url = self.op_url(path, "GETFILESTATUS", &[])?;
        let resp = self.send(Method::GET, url, path).await?;
        if resp.status() == StatusCode::NOT_FOUND {
            return Ok(None);
        }
        let env: FileStatusEnvelope = json_body(check(resp, path).await?, path).await?;
        Ok(Some(env.file_status.into_status()))
    }

    async fn do_list(&self, path: &str) -> Result<Vec<String>, FsError> {
        let url = self.op_url(path, "LISTSTATUS", &[])?;
        let resp = check(self.send(Method::GET, url, path).await?, path).await?;
        let env: ListEnvelope = json_body(resp, path).await?;
        let mut names: Vec<String> = env
            .file_statuses
            .file_status
            .into_iter()
            .map(|s| s.path_suffix)
            .collect();
        names.sort();
        Ok(names)
    }

    async fn do_mkdirs(&self, path: &str) -> Result<(), FsError> {
        let url = self.op_url(path, "MKDIRS", &[])?;
        let resp = check(self.send(Method::PUT, url, path).await?, path).await?;
        let body: BooleanResponse = json_body(resp, path).await?;
        if body.boolean {
            Ok(())
        } else {
            Err(FsError::io(format!("{path}: MKDIRS returned false")))
        }
    }

    async fn do_read(&self, path: &str) -> Result<Vec<u8>, FsError> {
        let url = self.op_url(path, "OPEN", &[])?;
        let location = self.locate(Method::GET, url, path).await?;
        let resp = self
            .http
            .get(location)
            .send()
            .await
            .map_err(|e| FsError::io(format!("{path}: datanode request: {e}")))?;
        let resp = check(resp, path).await?;
        let bytes = resp
            .bytes()
            .await
            .map_err(|e| FsError::io(format!("{path}: read body: {e}")))?;
        Ok(bytes.to_vec())
    }
}

/// Pass 2xx/3xx through, turn everything else into a classified `FsError`.
async fn check(resp: Response, path: &str) -> Result<Response, FsError> {
    let status = resp.status();
    if status.is_success() || status.is_redirection() {
        return Ok(resp);
    }
    let body = resp.text().await.unwrap_or_default();
    Err(remote_error(status, &body, path))
}

async fn json_body<T: serde::de::DeserializeOwned>(resp: Response, path: &str) -> Result<T, FsError> {
    let body = resp
        .text()
        .await
        .map_err(|e| FsError::io(format!("{path}: read body: {e}")))?;
    serde_json::from_str(&body).map_err(|e| FsError::protocol(format!("{path}: parse response: {e}")))
}

// ════════════════════════════════════════════════════════════════
//  DistributedFs impl
// ════════════════════════════════════════════════════════════════

impl DistributedFs for WebHdfsClient {
    fn status<'a>(&'a self, path: &'a str)
        -> Pin<Box<dyn Future<Output = Result<Option<FileStatus>, FsError>> + Send + 'a>>
    {
        Box::pin(self.do_status(path))
    }

    fn list<'a>(&'a self, path: &'a str)
        -> Pin<Box<dyn Future<Output = Result<Vec<String>, FsError>> + Send + 'a>>
    {
        Box::pin(self.do_list(path))
    }

    fn mkdirs<'a>(&'a self, path: &'a str)
        -> Pin<Box<dyn Future<Output = Result<(), FsError>> + Send + 'a>>
    {
        Box::pin(self.do_mkdirs(path))
    }

    fn create<'a>(&'a self, path: &'a str, data: &'a [u8], overwrite: bool)
        -> Pin<Box<dyn Future<Output = Result<(), FsError>> + Send + 'a>>
    {
        Box::pin(async move {
            let overwrite = if overwrite { "true" } else { "false" };
            let url = self.op_url(path, "CREATE", &[("overwrite", overwrite)])?;
            self.upload(Method::PUT, url, path, data).await?;
            tracing::debug!(path, overwrite, "webhdfs create");
            Ok(())
        })
    }

    fn append<'a>(&'a self, path: &'a str, data: &'a [u8])
        -> Pin<Box<dyn Future<Output = Result<(), FsError>> + Send + 'a>>
    {
        Box::pin(async move {
            let url = self.op_url(path, "APPEND", &[])?;
            self.upload(Method::POST, url, path, data).await?;
            tracing::debug!(path, bytes = data.len(), "webhdfs append");
            Ok(())
        })
    }

    fn read<'a>(&'a self, path: &'a str)
        -> Pin<Box<dyn Future<Output = Result<Vec<u8>, FsError>> + Send + 'a>>
    {
        Box::pin(self.do_read(path))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn client() -> WebHdfsClient {
        WebHdfsClient::new("http://namenode:9870/", "hdfs", Duration::from_secs(5)).unwrap()
    }

    #[test]
    fn op_url_encodes_segments_and_query() {
        let url = client()
            .op_url("/user/savora/events/by_user/a b/X_2024-05-01.json", "APPEND", &[])
            .unwrap();
        assert_eq!(
            url.as_str(),
            "http://namenode:9870/webhdfs/v1/user/savora/events/by_user/a%20b/X_2024-05-01.json?op=APPEND&user.name=hdfs"
        );
    }

    #[test]
    fn op_url_extra_params() {
        let url = client().op_url("/e/f.json", "CREATE", &[("overwrite", "false")]).unwrap();
        assert_eq!(url.query(), Some("op=CREATE&user.name=hdfs&overwrite=false"));
    }

    #[test]
    fn rejects_bad_base_url() {
        let err = WebHdfsClient::new("not a url", "hdfs", Duration::from_secs(1)).err().unwrap();
        assert_eq!(err.kind(), sink_api::FsErrorKind::Config);
    }
}
