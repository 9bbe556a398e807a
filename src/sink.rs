use std::fmt::Write as _;

use anyhow::{Context, Result};
use tokio::io::{AsyncWriteExt, BufWriter};
use tokio::net::TcpStream;
use tracing::info;

use crate::metric::OutputRecord;

/// Destination for output records, held for the duration of one run.
pub trait Sink: Send {
    /// Emit a single record.
    fn send(
        &mut self,
        record: &OutputRecord,
    ) -> impl std::future::Future<Output = Result<()>> + Send;

    /// Push any buffered records to the destination.
    fn flush(&mut self) -> impl std::future::Future<Output = Result<()>> + Send;
}

/// Format one record as a proxy line, without the trailing newline:
/// `<name> <value> <timestampSeconds> source=<source>[ <k>=<v>]*`.
///
/// The protocol defines no escaping; whitespace or `=` inside tag keys
/// or values will corrupt the line.
pub fn format_line(record: &OutputRecord) -> String {
    let mut line = format!(
        "{} {} {} source={}",
        record.name,
        record.value,
        record.timestamp_millis / 1000,
        record.source,
    );

    for (key, value) in &record.point_tags {
        let _ = write!(line, " {key}={value}");
    }

    line
}

/// Line-protocol sink over a single TCP connection to the proxy.
pub struct ProxySink {
    writer: BufWriter<TcpStream>,
}

impl ProxySink {
    /// Connect to the proxy at `host:port`.
    pub async fn connect(host: &str, port: u16) -> Result<Self> {
        let stream = TcpStream::connect((host, port))
            .await
            .with_context(|| format!("connecting to proxy {host}:{port}"))?;

        info!(%host, port, "connected to proxy");

        Ok(Self {
            writer: BufWriter::new(stream),
        })
    }

    /// Flush buffered lines and close the connection.
    pub async fn shutdown(mut self) -> Result<()> {
        self.writer
            .flush()
            .await
            .context("flushing proxy connection")?;
        self.writer
            .get_mut()
            .shutdown()
            .await
            .context("closing proxy connection")?;

        Ok(())
    }
}

impl Sink for ProxySink {
    async fn send(&mut self, record: &OutputRecord) -> Result<()> {
        let mut line = format_line(record);
        line.push('\n');

        self.writer
            .write_all(line.as_bytes())
            .await
            .context("writing record to proxy")?;

        Ok(())
    }

    async fn flush(&mut self) -> Result<()> {
        self.writer.flush().await.context("flushing proxy sink")?;
        Ok(())
    }
}

/// Dry-run sink: prints the would-be proxy lines to stdout.
pub struct DryRunSink {
    target: String,
}

impl DryRunSink {
    pub fn new(host: &str, port: u16) -> Self {
        Self {
            target: format!("{host}:{port}"),
        }
    }

    /// The printed form: the proxy line prefixed with the target that
    /// would have received it.
    fn render(&self, record: &OutputRecord) -> String {
        format!("[{}] {}", self.target, format_line(record))
    }
}

impl Sink for DryRunSink {
    async fn send(&mut self, record: &OutputRecord) -> Result<()> {
        println!("{}", self.render(record));
        Ok(())
    }

    async fn flush(&mut self) -> Result<()> {
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use std::collections::BTreeMap;

    use super::*;

    fn record() -> OutputRecord {
        let mut point_tags = BTreeMap::new();
        point_tags.insert("Namespace".to_string(), "AWS/EC2".to_string());
        point_tags.insert("InstanceId".to_string(), "i-1".to_string());

        OutputRecord {
            name: "aws.ec2.cpuutilization.avg".to_string(),
            value: 42.5,
            timestamp_millis: 1_700_000_000_500,
            source: "worker".to_string(),
            point_tags,
        }
    }

    #[test]
    fn test_format_line() {
        // Point tags come out in key order; the timestamp is truncated
        // to seconds.
        assert_eq!(
            format_line(&record()),
            "aws.ec2.cpuutilization.avg 42.5 1700000000 source=worker \
             InstanceId=i-1 Namespace=AWS/EC2"
        );
    }

    #[test]
    fn test_format_line_without_tags() {
        let mut r = record();
        r.point_tags.clear();
        assert_eq!(
            format_line(&r),
            "aws.ec2.cpuutilization.avg 42.5 1700000000 source=worker"
        );
    }

    #[test]
    fn test_dry_run_sink_prefixes_lines_with_target() {
        let sink = DryRunSink::new("127.0.0.1", 2878);
        assert_eq!(
            sink.render(&record()),
            "[127.0.0.1:2878] aws.ec2.cpuutilization.avg 42.5 1700000000 \
             source=worker InstanceId=i-1 Namespace=AWS/EC2"
        );
    }

    #[tokio::test]
    async fn test_proxy_sink_writes_newline_terminated_lines() {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
            .await
            .expect("bind");
        let addr = listener.local_addr().expect("addr");

        let server = tokio::spawn(async move {
            let (mut socket, _) = listener.accept().await.expect("accept");
            let mut data = Vec::new();
            tokio::io::AsyncReadExt::read_to_end(&mut socket, &mut data)
                .await
                .expect("read");
            String::from_utf8(data).expect("utf8")
        });

        let mut sink = ProxySink::connect(&addr.ip().to_string(), addr.port())
            .await
            .expect("connect");
        sink.send(&record()).await.expect("send");
        sink.shutdown().await.expect("shutdown");

        let received = server.await.expect("server");
        assert_eq!(received, format!("{}\n", format_line(&record())));
    }
}
