use std::fs;
use std::path::PathBuf;
use std::time::Duration;

use facedetection_live::face_detection::{DetectionResult, FaceDetection, Keypoint, KeypointSet};
use facedetection_live::renderer::recording::{GlCall, RecordingGl};
use facedetection_live::renderer::shader::{
    GlslVersion, ShaderAssets, ShaderStage, A_POSITION, FRAGMENT_SHADER_ASSET, U_COLOR,
    VERTEX_SHADER_ASSET,
};
use facedetection_live::renderer::{
    keypoint_projection, PointStyle, PointsRenderer, ResultGlRenderer,
};
use facedetection_live::Error;

fn assets() -> ShaderAssets {
    let root = PathBuf::from(env!("CARGO_MANIFEST_DIR")).join("assets");
    ShaderAssets::new(root, GlslVersion::Gles300)
}

fn renderer() -> PointsRenderer<RecordingGl> {
    PointsRenderer::new(assets(), PointStyle::default())
}

fn keypoints(offset: f32) -> KeypointSet {
    let mut points = [Keypoint::default(); 6];
    for (i, point) in points.iter_mut().enumerate() {
        *point = Keypoint::new(offset + i as f32 * 0.05, offset + 0.5 - i as f32 * 0.03);
    }
    points
}

fn interleaved(points: &KeypointSet) -> Vec<f32> {
    points.iter().flat_map(|point| [point.x, point.y]).collect()
}

fn result(faces: Vec<FaceDetection>) -> DetectionResult {
    DetectionResult::new(Duration::from_millis(33), faces)
}

fn ready(gl: &RecordingGl) -> PointsRenderer<RecordingGl> {
    let mut renderer = renderer();
    renderer.setup_rendering(gl).unwrap();
    gl.clear();
    renderer
}

#[test]
fn two_faces_draw_twice_with_interleaved_buffers() {
    let gl = RecordingGl::new();
    let mut renderer = ready(&gl);
    let (first, second) = (keypoints(0.1), keypoints(0.4));

    renderer
        .render_result(
            &gl,
            Some(&result(vec![FaceDetection::new(0.9, first), FaceDetection::new(0.8, second)])),
            &keypoint_projection(false),
        )
        .unwrap();

    assert_eq!(gl.draw_calls(), vec![6, 6]);
    assert_eq!(gl.uploaded_vertices(), vec![interleaved(&first), interleaved(&second)]);
}

#[test]
fn faces_without_location_data_are_skipped() {
    let gl = RecordingGl::new();
    let mut renderer = ready(&gl);

    renderer
        .render_result(
            &gl,
            Some(&result(vec![FaceDetection::without_location(0.9)])),
            &keypoint_projection(false),
        )
        .unwrap();
    assert!(gl.draw_calls().is_empty());

    gl.clear();
    renderer
        .render_result(
            &gl,
            Some(&result(vec![
                FaceDetection::without_location(0.9),
                FaceDetection::new(0.7, keypoints(0.2)),
                FaceDetection::without_location(0.6),
            ])),
            &keypoint_projection(false),
        )
        .unwrap();
    assert_eq!(gl.draw_calls(), vec![6]);
}

#[test]
fn absent_and_empty_results_draw_nothing() {
    let gl = RecordingGl::new();
    let mut renderer = ready(&gl);

    renderer
        .render_result(&gl, None, &keypoint_projection(true))
        .unwrap();
    assert!(gl.calls().is_empty());

    renderer
        .render_result(&gl, Some(&result(Vec::new())), &keypoint_projection(true))
        .unwrap();
    assert!(gl.draw_calls().is_empty());
    assert!(gl.uploaded_vertices().is_empty());
}

#[test]
fn uniforms_are_identical_on_every_render() {
    let gl = RecordingGl::new();
    let mut renderer = ready(&gl);
    let projection = keypoint_projection(false);

    let uniforms = |gl: &RecordingGl| -> Vec<GlCall> {
        gl.calls()
            .into_iter()
            .filter(|call| {
                matches!(
                    call,
                    GlCall::Uniform1f { .. }
                        | GlCall::Uniform4f { .. }
                        | GlCall::UniformMatrix4 { .. }
                )
            })
            .collect()
    };

    let one = result(vec![FaceDetection::new(0.9, keypoints(0.1))]);
    renderer.render_result(&gl, Some(&one), &projection).unwrap();
    let one_face = uniforms(&gl);

    gl.clear();
    renderer
        .render_result(
            &gl,
            Some(&result(vec![
                FaceDetection::new(0.9, keypoints(0.1)),
                FaceDetection::new(0.9, keypoints(0.3)),
                FaceDetection::new(0.9, keypoints(0.5)),
            ])),
            &projection,
        )
        .unwrap();
    let three_faces = uniforms(&gl);

    assert_eq!(one_face, three_faces);
    assert!(one_face.contains(&GlCall::Uniform1f { location: 0, value: 16.0 }));
    assert!(one_face.contains(&GlCall::Uniform4f { location: 2, value: [1.0, 0.0, 0.0, 1.0] }));
}

#[test]
fn program_is_unbound_after_setup_and_render() {
    let gl = RecordingGl::new();
    let mut renderer = renderer();
    renderer.setup_rendering(&gl).unwrap();
    assert_eq!(gl.current_program(), None);

    let one = result(vec![FaceDetection::new(0.9, keypoints(0.1))]);
    renderer
        .render_result(&gl, Some(&one), &keypoint_projection(false))
        .unwrap();
    assert_eq!(gl.current_program(), None);
    assert_eq!(gl.calls().last(), Some(&GlCall::UseProgram(None)));
}

#[test]
fn render_before_setup_is_an_error() {
    let gl = RecordingGl::new();
    let mut renderer = renderer();
    let outcome = renderer.render_result(
        &gl,
        Some(&result(vec![FaceDetection::new(0.9, keypoints(0.1))])),
        &keypoint_projection(false),
    );
    assert!(matches!(outcome, Err(Error::RendererNotReady)));
    assert!(gl.calls().is_empty());
}

#[test]
fn second_setup_keeps_the_existing_program() {
    let gl = RecordingGl::new();
    let mut renderer = renderer();
    renderer.setup_rendering(&gl).unwrap();
    let live = gl.live_objects();
    gl.clear();

    renderer.setup_rendering(&gl).unwrap();
    assert!(gl.calls().is_empty());
    assert_eq!(gl.live_objects(), live);
}

#[test]
fn invalid_shader_source_fails_setup_without_leaking() {
    let dir = tempfile::tempdir().unwrap();
    let vertex = dir.path().join(VERTEX_SHADER_ASSET);
    fs::create_dir_all(vertex.parent().unwrap()).unwrap();
    fs::write(&vertex, "attribute vec4 a_Position; this is not glsl").unwrap();
    fs::copy(
        PathBuf::from(env!("CARGO_MANIFEST_DIR")).join("assets").join(FRAGMENT_SHADER_ASSET),
        dir.path().join(FRAGMENT_SHADER_ASSET),
    )
    .unwrap();

    let gl = RecordingGl::new();
    let mut renderer: PointsRenderer<RecordingGl> = PointsRenderer::new(
        ShaderAssets::new(dir.path(), GlslVersion::Gl330),
        PointStyle::default(),
    );

    let outcome = renderer.setup_rendering(&gl);
    assert!(matches!(
        outcome,
        Err(Error::ShaderCompile { stage: ShaderStage::Vertex, .. })
    ));
    assert!(!renderer.is_ready());
    assert_eq!(gl.live_objects(), 0);
    assert!(!gl.calls().iter().any(|call| matches!(call, GlCall::CreateProgram(_))));
    assert!(matches!(
        renderer.render_result(&gl, Some(&result(Vec::new())), &keypoint_projection(false)),
        Err(Error::RendererNotReady)
    ));
}

#[test]
fn missing_asset_is_reported() {
    let dir = tempfile::tempdir().unwrap();
    let gl = RecordingGl::new();
    let mut renderer: PointsRenderer<RecordingGl> = PointsRenderer::new(
        ShaderAssets::new(dir.path(), GlslVersion::Gl120),
        PointStyle::default(),
    );

    assert!(matches!(
        renderer.setup_rendering(&gl),
        Err(Error::ShaderAsset { .. })
    ));
    assert_eq!(gl.live_objects(), 0);
}

#[test]
fn compile_and_link_failures_release_everything() {
    for gl in [
        RecordingGl::new().failing_compile(ShaderStage::Fragment),
        RecordingGl::new().failing_link(),
    ] {
        let mut renderer = renderer();
        assert!(renderer.setup_rendering(&gl).is_err());
        assert!(!renderer.is_ready());
        assert_eq!(gl.live_objects(), 0, "calls: {:?}", gl.calls());
    }
}

#[test]
fn missing_handles_are_configuration_errors() {
    for name in [A_POSITION, U_COLOR] {
        let gl = RecordingGl::new().without_handle(name);
        let mut renderer = renderer();
        match renderer.setup_rendering(&gl) {
            Err(Error::MissingHandle { name: missing, .. }) => assert_eq!(missing, name),
            other => panic!("expected missing handle error, got {:?}", other),
        }
        assert_eq!(gl.live_objects(), 0);
    }
}

#[test]
fn draws_without_vertex_arrays() {
    let gl = RecordingGl::new().without_vertex_arrays();
    let mut renderer = ready(&gl);

    let one = result(vec![FaceDetection::new(0.9, keypoints(0.1))]);
    renderer
        .render_result(&gl, Some(&one), &keypoint_projection(false))
        .unwrap();

    assert_eq!(gl.draw_calls(), vec![6]);
    assert!(!gl.calls().iter().any(|call| matches!(call, GlCall::BindVertexArray(_))));
}

#[test]
fn release_deletes_all_objects_and_requires_new_setup() {
    let gl = RecordingGl::new();
    let mut renderer = renderer();
    renderer.setup_rendering(&gl).unwrap();
    assert!(gl.live_objects() > 0);

    renderer.release(&gl);
    assert_eq!(gl.live_objects(), 0);
    assert!(!renderer.is_ready());

    renderer.setup_rendering(&gl).unwrap();
    assert!(renderer.is_ready());
}
