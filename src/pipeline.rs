// 该文件是 Shanan Clinic （山南诊所） 项目的一部分。
// src/pipeline.rs - 检测、绘制、概要的串联
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

use std::time::Instant;

use tracing::{error, info};

use crate::{
  frame::SourceImage,
  model::{DetectionProvider, DetectionSet, ProviderError},
  output::draw::{AnnotatedImage, Compositor},
  report::summary::{FindingsReport, Summarizer},
};

/// 一张影像的完整处理结果
#[derive(Debug, Clone)]
pub struct Annotation {
  pub source_name: String,
  pub detections: DetectionSet,
  pub annotated: AnnotatedImage,
  pub findings: FindingsReport,
  /// 检测服务失败时的原因；此时 `detections` 为空
  pub provider_failure: Option<String>,
}

impl Annotation {
  pub fn is_degraded(&self) -> bool {
    self.provider_failure.is_some()
  }
}

/// 一次请求所需的全部能力：检测服务、绘制器与概要生成器。
/// 在 `main` 中构建一次，按引用传递。
pub struct Annotator<'a, P> {
  provider: &'a P,
  compositor: &'a Compositor<'a>,
  summarizer: Summarizer<'a>,
}

impl<'a, P: DetectionProvider> Annotator<'a, P> {
  pub fn new(provider: &'a P, compositor: &'a Compositor<'a>) -> Self {
    Self {
      provider,
      compositor,
      summarizer: Summarizer::new(compositor.style()),
    }
  }

  /// 检测服务失败时直接返回错误
  pub fn annotate(&self, source: &SourceImage) -> Result<Annotation, ProviderError> {
    let now = Instant::now();
    let detections = self.provider.detect(source)?;
    let detect_elapsed = now.elapsed();
    let annotation = self.finish(source, detections, None);
    info!(
      "{}: {} 个检测结果，检测耗时 {:.2?}，总耗时 {:.2?}",
      source.name(),
      annotation.detections.len(),
      detect_elapsed,
      now.elapsed()
    );
    Ok(annotation)
  }

  /// 检测服务失败时记录错误，以空结果继续，并在概要中注明未完成分析
  pub fn annotate_or_degrade(&self, source: &SourceImage) -> Annotation {
    match self.annotate(source) {
      Ok(annotation) => annotation,
      Err(e) => {
        error!("{} 检测失败 ({}): {}", source.name(), self.provider.name(), e);
        self.finish(source, DetectionSet::empty(), Some(e.to_string()))
      }
    }
  }

  fn finish(
    &self,
    source: &SourceImage,
    detections: DetectionSet,
    provider_failure: Option<String>,
  ) -> Annotation {
    let annotated = self.compositor.compose(source.image(), &detections);
    let findings = if provider_failure.is_some() {
      FindingsReport::unavailable()
    } else {
      self.summarizer.summarize(&detections)
    };
    Annotation {
      source_name: source.name().to_string(),
      detections,
      annotated,
      findings,
      provider_failure,
    }
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::config::StyleConfig;
  use crate::model::{BoundingBox, ClassLabel, Detection};
  use crate::report::summary::PROVIDER_UNAVAILABLE_MESSAGE;
  use image::{DynamicImage, RgbImage};

  struct FixedProvider(Option<DetectionSet>);

  impl DetectionProvider for FixedProvider {
    fn name(&self) -> &str {
      "fixed"
    }

    fn detect(&self, _source: &SourceImage) -> Result<DetectionSet, ProviderError> {
      self
        .0
        .clone()
        .ok_or_else(|| ProviderError::Unavailable("offline".to_string()))
    }
  }

  fn source() -> SourceImage {
    SourceImage::new("case.png", DynamicImage::ImageRgb8(RgbImage::new(64, 64)))
  }

  #[test]
  fn annotation_carries_detections_and_findings() {
    let style = StyleConfig::default();
    let compositor = Compositor::with_font(&style, None);
    let provider = FixedProvider(Some(DetectionSet::new(vec![Detection::new(
      BoundingBox::new(10.0, 10.0, 50.0, 50.0),
      0.92,
      ClassLabel::Caries,
    )])));
    let annotator = Annotator::new(&provider, &compositor);

    let annotation = annotator.annotate(&source()).unwrap();
    assert_eq!(annotation.source_name, "case.png");
    assert_eq!(annotation.detections.len(), 1);
    assert_eq!(annotation.annotated.rendered, 1);
    assert_eq!(annotation.findings.total(), 1);
    assert!(!annotation.is_degraded());
  }

  #[test]
  fn provider_failure_surfaces_or_degrades() {
    let style = StyleConfig::default();
    let compositor = Compositor::with_font(&style, None);
    let provider = FixedProvider(None);
    let annotator = Annotator::new(&provider, &compositor);

    assert!(matches!(
      annotator.annotate(&source()),
      Err(ProviderError::Unavailable(_))
    ));

    let degraded = annotator.annotate_or_degrade(&source());
    assert!(degraded.is_degraded());
    assert!(degraded.detections.is_empty());
    assert_eq!(degraded.findings.text, PROVIDER_UNAVAILABLE_MESSAGE);
    assert_eq!(degraded.annotated.image.dimensions(), (64, 64));
  }
}
