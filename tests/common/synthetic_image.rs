use std::path::Path;

use image::{Rgb, RgbImage};

/// 生成一张灰度渐变的模拟 X 光片
pub fn radiograph(width: u32, height: u32) -> RgbImage {
  RgbImage::from_fn(width, height, |x, y| {
    let v = (40 + (x * 3 + y * 2) % 160) as u8;
    Rgb([v, v, v])
  })
}

pub fn write_radiograph(path: &Path, width: u32, height: u32) -> RgbImage {
  let image = radiograph(width, height);
  image.save(path).unwrap();
  image
}

/// 单个龋齿检测结果，检测框 (10,10)-(50,50)
pub const CARIES_BLOB: &str =
  r#"[{"box": [10, 10, 50, 50], "confidence": 0.92, "class_name": "Caries"}]"#;
