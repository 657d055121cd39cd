// 该文件是 Shanan Clinic （山南诊所） 项目的一部分。
// src/model/sidecar.rs - 从旁路 JSON 文件读取检测结果
//
// 本文件根据 Apache 许可证第 2.0 版（以下简称“许可证”）授权使用；
// 除非遵守该许可证条款，否则您不得使用本文件。
// 您可通过以下网址获取许可证副本：
// http://www.apache.org/licenses/LICENSE-2.0
// 除非适用法律要求或书面同意，根据本许可协议分发的软件均按“原样”提供，
// 不附带任何形式的明示或暗示的保证或条件。
// 有关许可权限与限制的具体条款，请参阅本许可协议。
//
// Copyright (C) 2026 Johann Li <me@qinka.pro>, Wareless Group

use std::path::{Path, PathBuf};

use tracing::{debug, info};
use url::Url;

use crate::{
  FromUrl, FromUrlWithScheme,
  frame::SourceImage,
  model::{DetectionProvider, DetectionSet, ProviderError},
};

/// 外部分割模型把每张影像的结果写成 `<目录>/<影像名>.json`，
/// 这里按影像名读回。
pub struct SidecarProvider {
  directory: PathBuf,
}

impl FromUrlWithScheme for SidecarProvider {
  const SCHEME: &'static str = "sidecar";
}

impl FromUrl for SidecarProvider {
  type Error = ProviderError;

  fn from_url(url: &Url) -> Result<Self, Self::Error> {
    if url.scheme() != Self::SCHEME {
      return Err(ProviderError::SchemeMismatch(format!(
        "期望方案 '{}', 实际方案 '{}'",
        Self::SCHEME,
        url.scheme()
      )));
    }
    Self::open(crate::url_path(url))
  }
}

impl SidecarProvider {
  pub fn open(directory: impl AsRef<Path>) -> Result<Self, ProviderError> {
    let directory = directory.as_ref().to_path_buf();
    if !directory.is_dir() {
      return Err(ProviderError::Unavailable(format!(
        "检测结果目录不存在: {}",
        directory.display()
      )));
    }
    info!("检测结果目录: {}", directory.display());
    Ok(Self { directory })
  }

  fn blob_path(&self, source: &SourceImage) -> PathBuf {
    self.directory.join(format!("{}.json", source.stem()))
  }
}

impl DetectionProvider for SidecarProvider {
  fn name(&self) -> &str {
    "sidecar"
  }

  fn detect(&self, source: &SourceImage) -> Result<DetectionSet, ProviderError> {
    let path = self.blob_path(source);
    debug!("读取检测结果: {}", path.display());
    let blob = std::fs::read_to_string(&path)
      .map_err(|e| ProviderError::Unavailable(format!("{}: {}", path.display(), e)))?;
    DetectionSet::from_blob(&blob)
      .map_err(|e| ProviderError::Unavailable(format!("{}: {}", path.display(), e)))
  }
}
