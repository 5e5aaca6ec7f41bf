//! Live fixes from a gpsd daemon.
//!
//! Speaks the gpsd JSON protocol over TCP: one `?WATCH` command, then a
//! stream of newline-delimited reports of which only `TPV` matters here.

use chrono::{DateTime, Utc};
use serde::Deserialize;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::net::tcp::{OwnedReadHalf, OwnedWriteHalf};
use tokio::net::TcpStream;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, info, trace};

use super::{AuthorizationStatus, LocationEvent, LocationProvider, SignificantChangeFilter};
use crate::error::{Error, Result};
use crate::record::LocationFix;

const NAME: &str = "gpsd";

/// Enables JSON reporting on a gpsd connection.
pub const WATCH_COMMAND: &str = "?WATCH={\"enable\":true,\"json\":true};\n";

/// A gpsd report. Only the fields needed for a position are decoded.
#[derive(Debug, Deserialize)]
struct Report {
    class: String,
    #[serde(default)]
    mode: u8,
    time: Option<DateTime<Utc>>,
    lat: Option<f64>,
    lon: Option<f64>,
    eph: Option<f64>,
}

/// Decode one line of gpsd output.
///
/// Returns `Ok(None)` for reports that carry no usable position: non-`TPV`
/// classes, `mode` below 2 (no fix), or missing time or coordinates.
///
/// # Errors
///
/// Returns an error if the line is not valid JSON, or if its time falls
/// outside the years a store can hold.
pub fn parse_report(line: &str) -> std::result::Result<Option<LocationFix>, serde_json::Error> {
    let report: Report = serde_json::from_str(line)?;
    if report.class != "TPV" || report.mode < 2 {
        return Ok(None);
    }
    let (Some(time), Some(lat), Some(lon)) = (report.time, report.lat, report.lon) else {
        return Ok(None);
    };
    let fix = LocationFix {
        latitude: lat,
        longitude: lon,
        timestamp: time,
        horizontal_accuracy: report.eph,
    };
    if !fix.has_storable_timestamp() {
        return Err(serde::de::Error::custom(format!(
            "TPV time {time} is outside the storable years"
        )));
    }
    Ok(Some(fix))
}

/// Location provider backed by gpsd.
///
/// gpsd has no permission model, so the provider always reports
/// [`AuthorizationStatus::AuthorizedAlways`].
#[derive(Debug)]
pub struct GpsdProvider {
    address: String,
    min_distance_m: f64,
    events: Option<mpsc::Sender<LocationEvent>>,
    task: Option<JoinHandle<()>>,
}

impl GpsdProvider {
    /// Create a provider for gpsd at `address` (`host:port`).
    #[must_use]
    pub fn new(address: impl Into<String>, min_distance_m: f64) -> Self {
        Self {
            address: address.into(),
            min_distance_m,
            events: None,
            task: None,
        }
    }

    /// The gpsd address.
    #[must_use]
    pub fn address(&self) -> &str {
        &self.address
    }
}

#[async_trait::async_trait]
impl LocationProvider for GpsdProvider {
    fn name(&self) -> &'static str {
        NAME
    }

    fn bind(&mut self, events: mpsc::Sender<LocationEvent>) {
        self.events = Some(events);
    }

    fn authorization_status(&self) -> AuthorizationStatus {
        AuthorizationStatus::AuthorizedAlways
    }

    fn request_when_in_use_authorization(&mut self) {
        debug!("gpsd needs no authorization");
    }

    fn request_always_authorization(&mut self) {
        debug!("gpsd needs no authorization");
    }

    fn significant_change_available(&self) -> bool {
        true
    }

    async fn start_monitoring_significant_changes(&mut self) -> Result<()> {
        let events = self
            .events
            .clone()
            .ok_or_else(|| Error::provider_start(NAME, "no event channel bound"))?;

        let stream = TcpStream::connect(&self.address)
            .await
            .map_err(|e| Error::provider_start(NAME, format!("connect to {}: {e}", self.address)))?;
        let (reader, mut writer) = stream.into_split();
        writer
            .write_all(WATCH_COMMAND.as_bytes())
            .await
            .map_err(|e| Error::provider_start(NAME, format!("send WATCH: {e}")))?;

        info!("Connected to gpsd at {}", self.address);
        let filter = SignificantChangeFilter::new(self.min_distance_m);
        self.task = Some(tokio::spawn(read_reports(reader, writer, filter, events)));
        Ok(())
    }

    fn stop_monitoring(&mut self) -> Result<()> {
        if let Some(task) = self.task.take() {
            task.abort();
            debug!("gpsd reader stopped");
        }
        Ok(())
    }

    fn is_monitoring(&self) -> bool {
        self.task.as_ref().is_some_and(|task| !task.is_finished())
    }
}

/// Forward significant fixes until the connection closes or the receiver goes away.
async fn read_reports(
    reader: OwnedReadHalf,
    // Held so the connection stays open in both directions.
    _writer: OwnedWriteHalf,
    mut filter: SignificantChangeFilter,
    events: mpsc::Sender<LocationEvent>,
) {
    let mut lines = BufReader::new(reader).lines();
    loop {
        let event = match lines.next_line().await {
            Ok(Some(line)) => match parse_report(&line) {
                Ok(Some(fix)) if filter.accept(&fix) => LocationEvent::Locations(vec![fix]),
                Ok(_) => {
                    trace!("ignoring gpsd report: {}", line);
                    continue;
                }
                Err(e) => LocationEvent::Failed(format!("unreadable gpsd report: {e}")),
            },
            Ok(None) => break,
            Err(e) => {
                let _ = events
                    .send(LocationEvent::Failed(format!("gpsd read error: {e}")))
                    .await;
                break;
            }
        };
        if events.send(event).await.is_err() {
            return;
        }
    }
    let _ = events.send(LocationEvent::MonitoringStopped).await;
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use tokio::net::TcpListener;

    const TPV: &str = r#"{"class":"TPV","device":"/dev/ttyUSB0","mode":3,"time":"2024-01-07T12:00:00.000Z","lat":37.3317,"lon":-122.0302,"eph":8.5}"#;

    #[test]
    fn test_parse_tpv() {
        let fix = parse_report(TPV).unwrap().unwrap();
        assert!((fix.latitude - 37.3317).abs() < 1e-9);
        assert!((fix.longitude + 122.0302).abs() < 1e-9);
        assert_eq!(fix.timestamp, Utc.with_ymd_and_hms(2024, 1, 7, 12, 0, 0).unwrap());
        assert_eq!(fix.horizontal_accuracy, Some(8.5));
    }

    #[test]
    fn test_parse_ignores_other_classes() {
        let version = r#"{"class":"VERSION","release":"3.25","rev":"3.25","proto_major":3,"proto_minor":15}"#;
        assert!(parse_report(version).unwrap().is_none());
    }

    #[test]
    fn test_parse_ignores_no_fix() {
        let no_fix = r#"{"class":"TPV","mode":1,"time":"2024-01-07T12:00:00.000Z"}"#;
        assert!(parse_report(no_fix).unwrap().is_none());
    }

    #[test]
    fn test_parse_ignores_missing_coordinates() {
        let partial = r#"{"class":"TPV","mode":2,"time":"2024-01-07T12:00:00.000Z","lat":1.0}"#;
        assert!(parse_report(partial).unwrap().is_none());
    }

    #[test]
    fn test_parse_invalid_json() {
        assert!(parse_report("not json").is_err());
    }

    #[test]
    fn test_parse_rejects_unstorable_time() {
        let far_future = TPV.replace("2024-01-07T12:00:00.000Z", "+10000-01-01T00:00:00Z");
        assert!(parse_report(&far_future).is_err());

        let last_year = TPV.replace("2024-01-07T12:00:00.000Z", "9999-12-31T23:59:59Z");
        let fix = parse_report(&last_year).unwrap().unwrap();
        assert_eq!(
            fix.timestamp,
            Utc.with_ymd_and_hms(9999, 12, 31, 23, 59, 59).unwrap()
        );
    }

    #[test]
    fn test_provider_is_always_authorized() {
        let mut provider = GpsdProvider::new("127.0.0.1:2947", 500.0);
        provider.request_when_in_use_authorization();
        assert_eq!(
            provider.authorization_status(),
            AuthorizationStatus::AuthorizedAlways
        );
        assert!(provider.significant_change_available());
        assert!(!provider.is_monitoring());
        assert_eq!(provider.address(), "127.0.0.1:2947");
    }

    #[tokio::test]
    async fn test_start_without_binding_fails() {
        let mut provider = GpsdProvider::new("127.0.0.1:1", 0.0);
        let err = provider
            .start_monitoring_significant_changes()
            .await
            .unwrap_err();
        assert!(err.to_string().contains("no event channel"));
    }

    #[tokio::test]
    async fn test_streams_fixes_from_fake_gpsd() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let address = listener.local_addr().unwrap().to_string();

        let server = tokio::spawn(async move {
            let (socket, _) = listener.accept().await.unwrap();
            let (reader, mut writer) = socket.into_split();
            let mut lines = BufReader::new(reader).lines();
            let watch = lines.next_line().await.unwrap().unwrap();
            assert!(watch.starts_with("?WATCH="));

            let script = [
                r#"{"class":"VERSION","release":"3.25"}"#,
                TPV,
                "garbage",
                r#"{"class":"TPV","mode":3,"time":"2024-01-07T12:00:05.000Z","lat":37.3318,"lon":-122.0302}"#,
                r#"{"class":"TPV","mode":3,"time":"2024-01-07T12:10:00.000Z","lat":37.3500,"lon":-122.0302}"#,
            ];
            for line in script {
                writer.write_all(line.as_bytes()).await.unwrap();
                writer.write_all(b"\n").await.unwrap();
            }
        });

        let (tx, mut rx) = mpsc::channel(16);
        let mut provider = GpsdProvider::new(address, 500.0);
        provider.bind(tx);
        provider.start_monitoring_significant_changes().await.unwrap();

        let mut events = Vec::new();
        while let Some(event) = rx.recv().await {
            let done = event == LocationEvent::MonitoringStopped;
            events.push(event);
            if done {
                break;
            }
        }
        server.await.unwrap();

        assert_eq!(events.len(), 4);
        assert!(matches!(&events[0], LocationEvent::Locations(f) if f.len() == 1));
        assert!(matches!(&events[1], LocationEvent::Failed(_)));
        // The 12:00:05 fix moved ~11 m and is filtered out.
        match &events[2] {
            LocationEvent::Locations(f) => {
                assert_eq!(f[0].timestamp, Utc.with_ymd_and_hms(2024, 1, 7, 12, 10, 0).unwrap());
            }
            other => panic!("unexpected event: {other:?}"),
        }
        assert_eq!(events[3], LocationEvent::MonitoringStopped);
    }
}
