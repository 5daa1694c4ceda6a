//! Query orchestration: cache-or-fetch for reports, plus the maintenance commands.

use std::{collections::HashSet, sync::Arc};

use crate::{
    cache::{CacheEntry, ResultCache},
    command::Command,
    config::Config,
    credentials::CredentialStore,
    domain::{Credential, DeviceId, QueryKey, Scope},
    fetcher::StatusFetcher,
    report,
    topology::{ScopeLookup, Topology},
    upstream::{StatusSource, UpstreamConfig, VendorClient},
    Result,
};

pub const QUERY_FAILED: &str = "查询失败，请稍后再试。";
pub const NO_MATCHING_DEVICES: &str = "暂无匹配设备";

const HELP_TEXT: &str = "🔌 校园充电桩查询\n\n\
命令：\n\
/电桩 [校区] [区域] - 查询充电口状态（不填则查询全部）\n\
/区域 [校区] - 列出校区，或某校区下的区域\n\
/刷新 - 清空缓存，下次查询获取最新数据\n\
/绑定 <设备ID> <SUID> - 设置设备凭证（维护用）\n\
/帮助 - 显示本帮助\n\n\
图例：[n]空闲 = 第 n 口空闲；[n]⚡1.5h = 充电中（已充/预计时长）；⚠️待校准 = 设备缺少凭证";

/// What a `query` produced, before it is turned into reply text.
#[derive(Clone, Debug)]
pub enum QueryOutcome {
    Fresh(CacheEntry),
    Cached(CacheEntry),
    UnknownCampus {
        campus: String,
        known: Vec<String>,
    },
    UnknownArea {
        campus: Option<String>,
        area: String,
        known: Vec<String>,
    },
    NoDevices,
    Failed,
}

pub struct ChargeService {
    topology: Arc<Topology>,
    credentials: Arc<CredentialStore>,
    fetcher: StatusFetcher,
    cache: ResultCache,
}

impl ChargeService {
    pub fn new(
        topology: Arc<Topology>,
        credentials: Arc<CredentialStore>,
        source: Arc<dyn StatusSource>,
        cache: ResultCache,
        fetch_concurrency: usize,
    ) -> Self {
        let fetcher = StatusFetcher::new(source, credentials.clone(), fetch_concurrency);
        Self {
            topology,
            credentials,
            fetcher,
            cache,
        }
    }

    /// Wire the service from config: load both data files and build the vendor client.
    pub fn from_config(cfg: &Config) -> Result<Self> {
        let topology = Arc::new(Topology::load_or_empty(&cfg.topology_file));
        let credentials = Arc::new(CredentialStore::load(cfg.credential_file.clone()));
        let source: Arc<dyn StatusSource> =
            Arc::new(VendorClient::new(UpstreamConfig::from_config(cfg))?);

        tracing::info!(
            topology = %cfg.topology_file.display(),
            campuses = topology.campus_names().count(),
            cache_ttl_secs = cfg.cache_ttl.as_secs(),
            "charge service ready"
        );

        Ok(Self::new(
            topology,
            credentials,
            source,
            ResultCache::new(cfg.cache_ttl),
            cfg.fetch_concurrency,
        ))
    }

    pub fn topology(&self) -> &Topology {
        &self.topology
    }

    /// Dispatch a parsed chat command.
    pub async fn handle(&self, command: Command) -> String {
        match command {
            Command::Query { campus, area } => self.query(campus, area).await,
            Command::Refresh => self.refresh().await,
            Command::ListAreas { campus } => self.list_areas(campus.as_deref()),
            Command::SetCredential {
                device_id,
                credential,
            } => self.set_credential(&device_id, &credential).await,
            Command::Usage(usage) => format!("用法：{usage}"),
            Command::Help => self.help().to_string(),
        }
    }

    pub async fn query(&self, campus: Scope, area: Scope) -> String {
        match self.run_query(campus, area).await {
            QueryOutcome::Fresh(entry) => format!(
                "{}\n\n🕒 更新于 {}",
                entry.report,
                entry.fetched_at.format("%H:%M:%S")
            ),
            QueryOutcome::Cached(entry) => format!(
                "{}\n\n🕒 缓存于 {}（{} 秒前）",
                entry.report,
                entry.fetched_at.format("%H:%M:%S"),
                entry.age().as_secs()
            ),
            QueryOutcome::UnknownCampus { campus, known } => {
                format!("未知校区：{campus}\n可选校区：{}", known.join("、"))
            }
            QueryOutcome::UnknownArea {
                campus: Some(campus),
                area,
                known,
            } => format!("未知区域：{area}\n{campus} 可选区域：{}", known.join("、")),
            QueryOutcome::UnknownArea {
                campus: None, area, ..
            } => format!("未知区域：{area}"),
            QueryOutcome::NoDevices => NO_MATCHING_DEVICES.to_string(),
            QueryOutcome::Failed => QUERY_FAILED.to_string(),
        }
    }

    pub async fn run_query(&self, campus: Scope, area: Scope) -> QueryOutcome {
        let key = QueryKey::new(campus, area);

        if let Some(entry) = self.cache.get(&key).await {
            tracing::debug!(?key, age_secs = entry.age().as_secs(), "cache hit");
            return QueryOutcome::Cached(entry);
        }

        let ids = match self.topology.lookup(&key.campus, &key.area) {
            ScopeLookup::Devices(ids) => ids,
            ScopeLookup::UnknownCampus(campus) => {
                return QueryOutcome::UnknownCampus {
                    campus,
                    known: self.topology.campus_names().map(str::to_string).collect(),
                };
            }
            ScopeLookup::UnknownArea { campus, area } => {
                let known = campus
                    .as_deref()
                    .and_then(|c| self.topology.campus(c))
                    .map(|areas| areas.keys().cloned().collect())
                    .unwrap_or_default();
                return QueryOutcome::UnknownArea {
                    campus,
                    area,
                    known,
                };
            }
        };

        if ids.is_empty() {
            return QueryOutcome::NoDevices;
        }

        let outcome = match self.fetcher.fetch(&ids).await {
            Ok(o) => o,
            Err(e) => {
                tracing::error!(?key, error = %e, "status fetch failed");
                return QueryOutcome::Failed;
            }
        };
        if outcome.all_failed() {
            tracing::error!(?key, attempted = outcome.attempted, "every device query failed");
            return QueryOutcome::Failed;
        }

        let text = report::render(
            &self.topology,
            &outcome.ports,
            &outcome.resolved,
            &key.campus,
            &key.area,
        );

        let entry = CacheEntry::new(outcome.ports, text);
        self.cache.put(key, entry.clone()).await;
        QueryOutcome::Fresh(entry)
    }

    pub async fn refresh(&self) -> String {
        self.cache.clear().await;
        tracing::info!("result cache cleared");
        "🔄 缓存已清空，下次查询将获取最新数据。".to_string()
    }

    pub fn list_areas(&self, campus: Option<&str>) -> String {
        let Some(campus) = campus else {
            let mut seen = HashSet::new();
            let names: Vec<&str> = self
                .topology
                .campus_names()
                .filter(|c| seen.insert(*c))
                .collect();
            if names.is_empty() {
                return "暂无校区信息".to_string();
            }
            return format!("可选校区：{}", names.join("、"));
        };

        let Some(areas) = self.topology.campus(campus) else {
            let known: Vec<&str> = self.topology.campus_names().collect();
            return format!("未知校区：{campus}\n可选校区：{}", known.join("、"));
        };
        if areas.is_empty() {
            return format!("{campus} 暂无区域信息");
        }

        let mut lines = vec![format!("{campus} 可选区域：")];
        lines.extend(
            areas
                .iter()
                .map(|(area, devices)| format!("• {area}（{} 台设备）", devices.len())),
        );
        lines.join("\n")
    }

    pub async fn set_credential(&self, device_id: &str, credential: &str) -> String {
        let device_id = device_id.trim();
        let credential = credential.trim();
        if device_id.is_empty() || credential.is_empty() {
            return format!("用法：{}", crate::command::SET_CREDENTIAL_USAGE);
        }

        let id = DeviceId::new(device_id);
        let known = self.topology.contains_device(&id);

        if let Err(e) = self
            .credentials
            .set_credential(id, Credential::new(credential))
            .await
        {
            tracing::error!(device_id, error = %e, "credential write failed");
            return "❌ 保存失败，凭证未更新，请稍后再试。".to_string();
        }

        // Cached reports may still show the old marker for this device.
        self.cache.clear().await;

        let mut reply = format!("✅ 已绑定设备 {device_id}");
        if !Credential::new(credential).is_resolved() {
            reply.push_str("（已标记为待校准）");
        }
        if !known {
            reply.push_str("\n注意：该设备不在设备表中，查询结果不会显示它。");
        }
        reply
    }

    pub fn help(&self) -> &'static str {
        HELP_TEXT
    }
}
