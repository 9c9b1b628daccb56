/// 跟踪系统 (Tracking System)
///
/// 运行在检测线程内, 每个周期顺序执行
/// - Tracker:    帧间关联 (最近邻贪心匹配)
/// - Enrichment: 身份/情绪/姿态识别 (按周期节流)
/// - Zone:       区域划分与特征记录
/// - Overlay:    叠加层数据
pub mod enrichment;
pub mod overlay;
pub mod tracker;
pub mod types;
pub mod zone;

pub use enrichment::{
    Enricher, FaceObservation, IdentityClassifier, NullIdentityClassifier, NullPoseClassifier,
    PoseClassifier,
};
pub use overlay::{build_overlay, FrameOverlay, OverlayOptions};
pub use tracker::{AssociationEngine, TrackedEntity, TrackingState, Trajectory};
pub use types::{BBox, Frame, Point, Region, Zone};
pub use zone::{classify_zone, extract_features, FeatureRecord};
