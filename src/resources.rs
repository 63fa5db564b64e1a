use std::{
    io::{BufReader, Cursor},
    path::{Path, PathBuf},
    sync::mpsc,
    thread,
};

use cgmath::{InnerSpace, Matrix4, SquareMatrix, Vector3, Vector4, Zero};

use crate::model::{self, ImageData, MaterialData, MeshData, ModelData, ModelVertex};

#[derive(Debug, thiserror::Error)]
pub enum LoadError {
    #[error("Unable to read {path}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("Invalid glTF: {0}")]
    Gltf(#[from] gltf::Error),
    #[error("Invalid OBJ: {0}")]
    Obj(#[from] tobj::LoadError),
    #[error("Unable to decode texture: {0}")]
    Image(#[from] image::ImageError),
    #[error("Unsupported model format: {0}")]
    UnsupportedFormat(PathBuf),
    #[error("{0} contains no triangle meshes")]
    EmptyModel(PathBuf),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ModelFormat {
    Gltf,
    Glb,
    Obj,
}

impl ModelFormat {
    pub fn from_path(path: &Path) -> Option<Self> {
        let extension = path.extension()?.to_str()?.to_ascii_lowercase();
        match extension.as_str() {
            "gltf" => Some(Self::Gltf),
            "glb" => Some(Self::Glb),
            "obj" => Some(Self::Obj),
            _ => None,
        }
    }
}

/// Bytes read so far out of the bytes the model is known to need.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LoadProgress {
    pub loaded: u64,
    pub total: u64,
}

impl LoadProgress {
    pub fn percent(&self) -> f64 {
        if self.total == 0 {
            return 100.0;
        }
        (self.loaded as f64 / self.total as f64 * 100.0).min(100.0)
    }
}

pub async fn load_string(path: &Path) -> Result<String, LoadError> {
    std::fs::read_to_string(path).map_err(|source| LoadError::Io {
        path: path.to_path_buf(),
        source,
    })
}

pub async fn load_binary(path: &Path) -> Result<Vec<u8>, LoadError> {
    std::fs::read(path).map_err(|source| LoadError::Io {
        path: path.to_path_buf(),
        source,
    })
}

pub async fn load_model_data(
    path: &Path,
    on_progress: &mut dyn FnMut(LoadProgress),
) -> Result<ModelData, LoadError> {
    let format =
        ModelFormat::from_path(path).ok_or_else(|| LoadError::UnsupportedFormat(path.into()))?;

    let data = match format {
        ModelFormat::Gltf | ModelFormat::Glb => load_gltf(path, on_progress).await?,
        ModelFormat::Obj => load_obj(path, on_progress).await?,
    };

    if data.meshes.iter().all(|m| m.indices.is_empty()) {
        return Err(LoadError::EmptyModel(path.into()));
    }
    Ok(data)
}

async fn load_gltf(
    path: &Path,
    on_progress: &mut dyn FnMut(LoadProgress),
) -> Result<ModelData, LoadError> {
    let bytes = load_binary(path).await?;
    let gltf::Gltf { document, blob } = gltf::Gltf::from_slice(&bytes)?;

    let buffer_bytes: u64 = document.buffers().map(|b| b.length() as u64).sum();
    let mut progress = LoadProgress {
        loaded: bytes.len() as u64,
        total: bytes.len() as u64 + buffer_bytes,
    };
    on_progress(progress);

    let base = path.parent();
    let buffers = gltf::import_buffers(&document, base, blob)?;
    progress.loaded = progress.total;
    on_progress(progress);

    let materials = document
        .materials()
        .map(|material| {
            let pbr = material.pbr_metallic_roughness();
            let diffuse = pbr
                .base_color_texture()
                .and_then(|info| load_gltf_image(info.texture().source(), base, &buffers));
            MaterialData {
                name: material
                    .name()
                    .map(str::to_string)
                    .unwrap_or_else(|| format!("material{}", material.index().unwrap_or(0))),
                base_color: pbr.base_color_factor(),
                diffuse,
            }
        })
        .collect();

    let scene = document
        .default_scene()
        .or_else(|| document.scenes().next())
        .ok_or_else(|| LoadError::EmptyModel(path.into()))?;

    let mut meshes = Vec::new();
    for node in scene.nodes() {
        visit_node(&node, Matrix4::identity(), &buffers, &mut meshes);
    }

    Ok(ModelData { meshes, materials })
}

/// A texture that cannot be read or decoded is dropped so the mesh still shows.
fn load_gltf_image(
    image: gltf::Image,
    base: Option<&Path>,
    buffers: &[gltf::buffer::Data],
) -> Option<ImageData> {
    match gltf::image::Data::from_source(image.source(), base, buffers) {
        Ok(data) => gltf_image_to_rgba(&data),
        Err(e) => {
            log::warn!("Unable to load texture {}: {}", image.index(), e);
            None
        }
    }
}

/// Flattens the node tree, baking each node's world transform into its vertices.
fn visit_node(
    node: &gltf::Node,
    parent: Matrix4<f32>,
    buffers: &[gltf::buffer::Data],
    out: &mut Vec<MeshData>,
) {
    let world = parent * Matrix4::from(node.transform().matrix());

    if let Some(mesh) = node.mesh() {
        for primitive in mesh.primitives() {
            if primitive.mode() != gltf::mesh::Mode::Triangles {
                log::warn!(
                    "Skipping {:?} primitive in mesh {}",
                    primitive.mode(),
                    mesh.name().unwrap_or("<unnamed>")
                );
                continue;
            }
            if let Some(data) = read_primitive(&mesh, &primitive, world, buffers) {
                out.push(data);
            }
        }
    }

    for child in node.children() {
        visit_node(&child, world, buffers, out);
    }
}

fn read_primitive(
    mesh: &gltf::Mesh,
    primitive: &gltf::Primitive,
    world: Matrix4<f32>,
    buffers: &[gltf::buffer::Data],
) -> Option<MeshData> {
    let reader = primitive.reader(|buffer| buffers.get(buffer.index()).map(|data| &data.0[..]));

    let positions: Vec<[f32; 3]> = reader.read_positions()?.collect();
    let normals: Option<Vec<[f32; 3]>> = reader.read_normals().map(Iterator::collect);
    let tex_coords: Option<Vec<[f32; 2]>> = reader
        .read_tex_coords(0)
        .map(|coords| coords.into_f32().collect());
    let mut indices: Vec<u32> = match reader.read_indices() {
        Some(indices) => indices.into_u32().collect(),
        None => (0..positions.len() as u32).collect(),
    };

    let mut vertices: Vec<ModelVertex> = positions
        .iter()
        .enumerate()
        .map(|(i, position)| ModelVertex {
            position: *position,
            tex_coords: tex_coords
                .as_ref()
                .and_then(|t| t.get(i).copied())
                .unwrap_or_default(),
            normal: normals
                .as_ref()
                .and_then(|n| n.get(i).copied())
                .unwrap_or_default(),
        })
        .collect();

    if normals.is_none() {
        compute_normals(&mut vertices, &indices);
    }
    bake_transform(&mut vertices, &mut indices, world);

    Some(MeshData {
        name: mesh
            .name()
            .map(str::to_string)
            .unwrap_or_else(|| format!("mesh{}", mesh.index())),
        vertices,
        indices,
        material: primitive.material().index(),
    })
}

/// Moves vertices into model space. Mirroring transforms flip the triangle
/// winding, so the index order is reversed to keep front faces CCW.
pub fn bake_transform(vertices: &mut [ModelVertex], indices: &mut [u32], transform: Matrix4<f32>) {
    let normal_matrix = model::normal_matrix(&transform);
    for vertex in vertices.iter_mut() {
        let p = transform * Vector4::new(vertex.position[0], vertex.position[1], vertex.position[2], 1.0);
        vertex.position = p.truncate().into();

        let n = normal_matrix * Vector3::from(vertex.normal);
        if n.magnitude2() > 0.0 {
            vertex.normal = n.normalize().into();
        }
    }

    if transform.determinant() < 0.0 {
        for triangle in indices.chunks_exact_mut(3) {
            triangle.swap(1, 2);
        }
    }
}

/// Smooth normals from area-weighted face normals. Out of range indices are ignored.
pub fn compute_normals(vertices: &mut [ModelVertex], indices: &[u32]) {
    let mut accumulated = vec![Vector3::<f32>::zero(); vertices.len()];

    for triangle in indices.chunks_exact(3) {
        let [a, b, c] = [triangle[0], triangle[1], triangle[2]].map(|i| i as usize);
        if a >= vertices.len() || b >= vertices.len() || c >= vertices.len() {
            continue;
        }
        let pa = Vector3::from(vertices[a].position);
        let pb = Vector3::from(vertices[b].position);
        let pc = Vector3::from(vertices[c].position);
        let face = (pb - pa).cross(pc - pa);
        accumulated[a] += face;
        accumulated[b] += face;
        accumulated[c] += face;
    }

    for (vertex, normal) in vertices.iter_mut().zip(accumulated) {
        vertex.normal = if normal.magnitude2() > 0.0 {
            normal.normalize().into()
        } else {
            [0.0, 1.0, 0.0]
        };
    }
}

/// Expands the 8 bit glTF pixel layouts to RGBA8. Other layouts are dropped.
pub fn gltf_image_to_rgba(image: &gltf::image::Data) -> Option<ImageData> {
    use gltf::image::Format;

    let rgba = match image.format {
        Format::R8G8B8A8 => image.pixels.clone(),
        Format::R8G8B8 => image
            .pixels
            .chunks_exact(3)
            .flat_map(|p| [p[0], p[1], p[2], 255])
            .collect(),
        Format::R8G8 => image
            .pixels
            .chunks_exact(2)
            .flat_map(|p| [p[0], p[0], p[0], p[1]])
            .collect(),
        Format::R8 => image.pixels.iter().flat_map(|&l| [l, l, l, 255]).collect(),
        other => {
            log::warn!("Ignoring texture with unsupported format {:?}", other);
            return None;
        }
    };

    Some(ImageData {
        width: image.width,
        height: image.height,
        rgba,
    })
}

pub async fn load_image(path: &Path) -> Result<ImageData, LoadError> {
    let bytes = load_binary(path).await?;
    let rgba = image::load_from_memory(&bytes)?.to_rgba8();
    Ok(ImageData {
        width: rgba.width(),
        height: rgba.height(),
        rgba: rgba.into_raw(),
    })
}

async fn load_obj(
    path: &Path,
    on_progress: &mut dyn FnMut(LoadProgress),
) -> Result<ModelData, LoadError> {
    let obj_text = load_string(path).await?;
    let total = obj_text.len() as u64;
    let base = path.parent().map(Path::to_path_buf).unwrap_or_default();

    let mut obj_reader = BufReader::new(Cursor::new(obj_text));
    let (models, obj_materials) = tobj::load_obj_buf_async(
        &mut obj_reader,
        &tobj::LoadOptions {
            triangulate: true,
            single_index: true,
            ..Default::default()
        },
        |p| {
            let mtl_path = base.join(p);
            async move {
                match load_string(&mtl_path).await {
                    Ok(text) => tobj::load_mtl_buf(&mut BufReader::new(Cursor::new(text))),
                    Err(_) => Err(tobj::LoadError::OpenFileFailed),
                }
            }
        },
    )
    .await?;
    on_progress(LoadProgress {
        loaded: total,
        total,
    });

    let obj_materials = obj_materials.unwrap_or_else(|e| {
        log::warn!("Unable to load materials for {}: {}", path.display(), e);
        Vec::new()
    });

    let mut materials = Vec::with_capacity(obj_materials.len());
    for m in obj_materials {
        let diffuse = if m.diffuse_texture.is_empty() {
            None
        } else {
            match load_image(&base.join(&m.diffuse_texture)).await {
                Ok(image) => Some(image),
                Err(e) => {
                    log::warn!(
                        "Unable to load texture for material {}: {:#}",
                        m.name,
                        anyhow::Error::new(e)
                    );
                    None
                }
            }
        };
        materials.push(MaterialData {
            name: m.name,
            base_color: [m.diffuse[0], m.diffuse[1], m.diffuse[2], m.dissolve],
            diffuse,
        });
    }

    let meshes = models
        .into_iter()
        .map(|m| {
            let mesh = m.mesh;
            let has_normals = !mesh.normals.is_empty();
            let mut vertices: Vec<ModelVertex> = (0..mesh.positions.len() / 3)
                .map(|i| ModelVertex {
                    position: [
                        mesh.positions[i * 3],
                        mesh.positions[i * 3 + 1],
                        mesh.positions[i * 3 + 2],
                    ],
                    tex_coords: if mesh.texcoords.len() >= i * 2 + 2 {
                        [mesh.texcoords[i * 2], 1.0 - mesh.texcoords[i * 2 + 1]]
                    } else {
                        [0.0, 0.0]
                    },
                    normal: if has_normals {
                        [
                            mesh.normals[i * 3],
                            mesh.normals[i * 3 + 1],
                            mesh.normals[i * 3 + 2],
                        ]
                    } else {
                        [0.0; 3]
                    },
                })
                .collect();
            if !has_normals {
                compute_normals(&mut vertices, &mesh.indices);
            }
            MeshData {
                name: m.name,
                vertices,
                indices: mesh.indices,
                material: mesh.material_id,
            }
        })
        .collect();

    Ok(ModelData { meshes, materials })
}

/// Loads a model on a worker thread so the window keeps rendering meanwhile.
pub struct ModelLoader {
    path: PathBuf,
    receiver: mpsc::Receiver<Result<ModelData, LoadError>>,
}

impl ModelLoader {
    pub fn spawn(path: PathBuf) -> Self {
        let (sender, receiver) = mpsc::channel();
        let worker_path = path.clone();
        thread::spawn(move || {
            let mut report = |progress: LoadProgress| {
                log::info!("{:.0}% loaded", progress.percent());
            };
            let result = pollster::block_on(load_model_data(&worker_path, &mut report));
            // The window may already be gone.
            let _ = sender.send(result);
        });
        Self { path, receiver }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// `None` while the worker is still busy.
    pub fn poll(&self) -> Option<Result<ModelData, LoadError>> {
        match self.receiver.try_recv() {
            Ok(result) => Some(result),
            Err(mpsc::TryRecvError::Empty) => None,
            Err(mpsc::TryRecvError::Disconnected) => Some(Err(LoadError::Io {
                path: self.path.clone(),
                source: std::io::Error::other("loader thread exited"),
            })),
        }
    }
}

#[cfg(test)]
mod tests {
    use std::time::{Duration, Instant};

    use cgmath::Rad;

    use super::*;

    fn temp_dir(name: &str) -> PathBuf {
        let dir = std::env::temp_dir().join(format!("model_viewer_{}_{}", name, std::process::id()));
        std::fs::create_dir_all(&dir).unwrap();
        dir
    }

    fn write_triangle_gltf(dir: &Path, node: &str) -> PathBuf {
        write_textured_gltf(dir, node, None)
    }

    /// `texture` is the image uri used as the material's base colour texture.
    fn write_textured_gltf(dir: &Path, node: &str, texture: Option<&str>) -> PathBuf {
        let (texture_info, images) = match texture {
            Some(uri) => (
                r#", "baseColorTexture": { "index": 0 }"#.to_string(),
                format!(r#""textures": [{{ "source": 0 }}], "images": [{{ "uri": "{uri}" }}],"#),
            ),
            None => (String::new(), String::new()),
        };
        let positions: [f32; 9] = [0.0, 0.0, 0.0, 1.0, 0.0, 0.0, 0.0, 1.0, 0.0];
        std::fs::write(dir.join("tri.bin"), bytemuck::cast_slice(&positions)).unwrap();

        let json = format!(
            r#"{{
                "asset": {{ "version": "2.0" }},
                "buffers": [{{ "uri": "tri.bin", "byteLength": 36 }}],
                "bufferViews": [{{ "buffer": 0, "byteLength": 36, "target": 34962 }}],
                "accessors": [{{
                    "bufferView": 0, "componentType": 5126, "count": 3, "type": "VEC3",
                    "min": [0.0, 0.0, 0.0], "max": [1.0, 1.0, 0.0]
                }}],
                "materials": [{{
                    "name": "red",
                    "pbrMetallicRoughness": {{ "baseColorFactor": [1.0, 0.0, 0.0, 1.0]{texture_info} }}
                }}],
                {images}
                "meshes": [{{
                    "name": "triangle",
                    "primitives": [{{ "attributes": {{ "POSITION": 0 }}, "material": 0 }}]
                }}],
                "nodes": [{node}],
                "scenes": [{{ "nodes": [0] }}],
                "scene": 0
            }}"#
        );
        let path = dir.join("tri.gltf");
        std::fs::write(&path, json).unwrap();
        path
    }

    fn assert_close(a: [f32; 3], b: [f32; 3]) {
        for (x, y) in a.iter().zip(b.iter()) {
            assert!((x - y).abs() < 1e-5, "{a:?} != {b:?}");
        }
    }

    #[test]
    fn detects_format_from_extension() {
        assert_eq!(
            ModelFormat::from_path(Path::new("cup/scene.gltf")),
            Some(ModelFormat::Gltf)
        );
        assert_eq!(
            ModelFormat::from_path(Path::new("CUP.GLB")),
            Some(ModelFormat::Glb)
        );
        assert_eq!(
            ModelFormat::from_path(Path::new("teapot.obj")),
            Some(ModelFormat::Obj)
        );
        assert_eq!(ModelFormat::from_path(Path::new("model.fbx")), None);
        assert_eq!(ModelFormat::from_path(Path::new("model")), None);
    }

    #[test]
    fn progress_percent() {
        assert_eq!(LoadProgress { loaded: 25, total: 100 }.percent(), 25.0);
        assert_eq!(LoadProgress { loaded: 0, total: 0 }.percent(), 100.0);
        assert_eq!(LoadProgress { loaded: 150, total: 100 }.percent(), 100.0);
    }

    #[test]
    fn computes_normals_for_flat_triangle() {
        let mut vertices = vec![
            ModelVertex {
                position: [0.0, 0.0, 0.0],
                ..Default::default()
            },
            ModelVertex {
                position: [1.0, 0.0, 0.0],
                ..Default::default()
            },
            ModelVertex {
                position: [0.0, 1.0, 0.0],
                ..Default::default()
            },
            ModelVertex::default(),
        ];
        compute_normals(&mut vertices, &[0, 1, 2, 0, 1, 9]);

        for vertex in &vertices[..3] {
            assert_close(vertex.normal, [0.0, 0.0, 1.0]);
        }
        // Unreferenced vertex gets a fallback instead of NaN.
        assert_close(vertices[3].normal, [0.0, 1.0, 0.0]);
    }

    #[test]
    fn bake_transform_moves_and_rotates() {
        let mut vertices = vec![ModelVertex {
            position: [1.0, 0.0, 0.0],
            tex_coords: [0.0, 0.0],
            normal: [1.0, 0.0, 0.0],
        }];
        let mut indices = vec![];
        let transform = Matrix4::from_translation(Vector3::new(0.0, 2.0, 0.0))
            * Matrix4::from_angle_z(Rad(std::f32::consts::FRAC_PI_2));
        bake_transform(&mut vertices, &mut indices, transform);

        assert_close(vertices[0].position, [0.0, 3.0, 0.0]);
        assert_close(vertices[0].normal, [0.0, 1.0, 0.0]);
    }

    #[test]
    fn bake_transform_fixes_mirrored_winding() {
        let mut vertices = vec![ModelVertex::default(); 3];
        let mut indices = vec![0, 1, 2];
        bake_transform(
            &mut vertices,
            &mut indices,
            Matrix4::from_nonuniform_scale(-1.0, 1.0, 1.0),
        );
        assert_eq!(indices, vec![0, 2, 1]);
    }

    #[test]
    fn converts_rgb_images() {
        let image = gltf::image::Data {
            pixels: vec![10, 20, 30, 40, 50, 60],
            format: gltf::image::Format::R8G8B8,
            width: 2,
            height: 1,
        };
        let rgba = gltf_image_to_rgba(&image).unwrap();
        assert_eq!(rgba.rgba, vec![10, 20, 30, 255, 40, 50, 60, 255]);
        assert_eq!((rgba.width, rgba.height), (2, 1));
    }

    #[test]
    fn drops_high_precision_images() {
        let image = gltf::image::Data {
            pixels: vec![0; 8],
            format: gltf::image::Format::R16G16B16A16,
            width: 1,
            height: 1,
        };
        assert!(gltf_image_to_rgba(&image).is_none());
    }

    #[test]
    fn loads_gltf_with_node_transform() {
        let dir = temp_dir("gltf");
        let path = write_triangle_gltf(&dir, r#"{ "mesh": 0, "translation": [0.0, 0.0, 1.0] }"#);

        let mut reports = Vec::new();
        let data = pollster::block_on(load_model_data(&path, &mut |p| reports.push(p))).unwrap();

        assert_eq!(data.meshes.len(), 1);
        let mesh = &data.meshes[0];
        assert_eq!(mesh.name, "triangle");
        assert_eq!(mesh.indices, vec![0, 1, 2]);
        assert_eq!(mesh.material, Some(0));
        assert_close(mesh.vertices[1].position, [1.0, 0.0, 1.0]);
        assert_close(mesh.vertices[0].normal, [0.0, 0.0, 1.0]);

        assert_eq!(data.materials.len(), 1);
        assert_eq!(data.materials[0].name, "red");
        assert_eq!(data.materials[0].base_color, [1.0, 0.0, 0.0, 1.0]);
        assert!(data.materials[0].diffuse.is_none());

        let last = reports.last().unwrap();
        assert_eq!(last.loaded, last.total);
        assert!(reports.len() >= 2);

        std::fs::remove_dir_all(&dir).ok();
    }

    #[test]
    fn loads_gltf_base_colour_texture() {
        let dir = temp_dir("gltf_texture");
        image::RgbaImage::from_pixel(2, 1, image::Rgba([10, 20, 30, 255]))
            .save(dir.join("tex.png"))
            .unwrap();
        let path = write_textured_gltf(&dir, r#"{ "mesh": 0 }"#, Some("tex.png"));

        let data = pollster::block_on(load_model_data(&path, &mut |_| {})).unwrap();

        let diffuse = data.materials[0].diffuse.as_ref().unwrap();
        assert_eq!((diffuse.width, diffuse.height), (2, 1));
        assert_eq!(&diffuse.rgba[..4], &[10, 20, 30, 255]);

        std::fs::remove_dir_all(&dir).ok();
    }

    #[test]
    fn missing_gltf_texture_keeps_mesh() {
        let dir = temp_dir("gltf_missing_texture");
        let path = write_textured_gltf(&dir, r#"{ "mesh": 0 }"#, Some("missing.png"));

        let data = pollster::block_on(load_model_data(&path, &mut |_| {})).unwrap();

        assert_eq!(data.meshes.len(), 1);
        assert_eq!(data.meshes[0].material, Some(0));
        assert_eq!(data.materials[0].base_color, [1.0, 0.0, 0.0, 1.0]);
        assert!(data.materials[0].diffuse.is_none());

        std::fs::remove_dir_all(&dir).ok();
    }

    #[test]
    fn loads_gltf_child_nodes() {
        let dir = temp_dir("gltf_children");
        let path = write_triangle_gltf(
            &dir,
            r#"{ "mesh": 0, "scale": [2.0, 2.0, 2.0], "children": [1] },
               { "mesh": 0, "translation": [1.0, 0.0, 0.0] }"#,
        );

        let data = pollster::block_on(load_model_data(&path, &mut |_| {})).unwrap();

        assert_eq!(data.meshes.len(), 2);
        assert_close(data.meshes[0].vertices[1].position, [2.0, 0.0, 0.0]);
        // Child inherits the parent's scale: (1 + 1) * 2.
        assert_close(data.meshes[1].vertices[1].position, [4.0, 0.0, 0.0]);

        std::fs::remove_dir_all(&dir).ok();
    }

    #[test]
    fn loads_obj_without_materials() {
        let dir = temp_dir("obj");
        let path = dir.join("quad.obj");
        std::fs::write(
            &path,
            "o quad\nv 0 0 0\nv 1 0 0\nv 1 1 0\nv 0 1 0\nvt 0 0\nvt 1 0\nvt 1 1\nvt 0 1\nf 1/1 2/2 3/3 4/4\n",
        )
        .unwrap();

        let data = pollster::block_on(load_model_data(&path, &mut |_| {})).unwrap();

        assert_eq!(data.meshes.len(), 1);
        let mesh = &data.meshes[0];
        assert_eq!(mesh.name, "quad");
        assert_eq!(mesh.indices.len(), 6);
        assert_eq!(mesh.material, None);
        assert_close(mesh.vertices[0].normal, [0.0, 0.0, 1.0]);
        assert_eq!(mesh.vertices[0].tex_coords, [0.0, 1.0]);
        assert!(data.materials.is_empty());

        std::fs::remove_dir_all(&dir).ok();
    }

    #[test]
    fn loads_obj_material_colour() {
        let dir = temp_dir("obj_mtl");
        std::fs::write(dir.join("tri.mtl"), "newmtl blue\nKd 0 0 1\nd 0.5\n").unwrap();
        let path = dir.join("tri.obj");
        std::fs::write(
            &path,
            "mtllib tri.mtl\no tri\nv 0 0 0\nv 1 0 0\nv 0 1 0\nusemtl blue\nf 1 2 3\n",
        )
        .unwrap();

        let data = pollster::block_on(load_model_data(&path, &mut |_| {})).unwrap();

        assert_eq!(data.materials.len(), 1);
        assert_eq!(data.materials[0].name, "blue");
        assert_eq!(data.materials[0].base_color, [0.0, 0.0, 1.0, 0.5]);
        assert_eq!(data.meshes[0].material, Some(0));

        std::fs::remove_dir_all(&dir).ok();
    }

    fn write_textured_obj(dir: &Path, texture: &str) -> PathBuf {
        std::fs::write(dir.join("tri.mtl"), format!("newmtl skin\nKd 1 1 1\nmap_Kd {texture}\n"))
            .unwrap();
        let path = dir.join("tri.obj");
        std::fs::write(
            &path,
            "mtllib tri.mtl\no tri\nv 0 0 0\nv 1 0 0\nv 0 1 0\nusemtl skin\nf 1 2 3\n",
        )
        .unwrap();
        path
    }

    #[test]
    fn loads_obj_diffuse_texture() {
        let dir = temp_dir("obj_texture");
        image::RgbaImage::from_pixel(1, 3, image::Rgba([1, 2, 3, 4]))
            .save(dir.join("skin.png"))
            .unwrap();
        let path = write_textured_obj(&dir, "skin.png");

        let data = pollster::block_on(load_model_data(&path, &mut |_| {})).unwrap();

        let diffuse = data.materials[0].diffuse.as_ref().unwrap();
        assert_eq!((diffuse.width, diffuse.height), (1, 3));
        assert_eq!(&diffuse.rgba[..4], &[1, 2, 3, 4]);

        std::fs::remove_dir_all(&dir).ok();
    }

    #[test]
    fn missing_obj_texture_keeps_mesh() {
        let dir = temp_dir("obj_missing_texture");
        let path = write_textured_obj(&dir, "gone.png");

        let data = pollster::block_on(load_model_data(&path, &mut |_| {})).unwrap();

        assert_eq!(data.meshes.len(), 1);
        assert_eq!(data.meshes[0].indices, vec![0, 1, 2]);
        assert_eq!(data.materials.len(), 1);
        assert_eq!(data.materials[0].name, "skin");
        assert!(data.materials[0].diffuse.is_none());

        std::fs::remove_dir_all(&dir).ok();
    }

    #[test]
    fn missing_file_is_an_io_error() {
        let result = pollster::block_on(load_model_data(
            Path::new("does/not/exist.gltf"),
            &mut |_| {},
        ));
        assert!(matches!(result, Err(LoadError::Io { .. })));
    }

    #[test]
    fn unknown_extension_is_rejected() {
        let result = pollster::block_on(load_model_data(Path::new("model.fbx"), &mut |_| {}));
        assert!(matches!(result, Err(LoadError::UnsupportedFormat(_))));
    }

    #[test]
    fn obj_without_faces_is_empty() {
        let dir = temp_dir("obj_empty");
        let path = dir.join("points.obj");
        std::fs::write(&path, "v 0 0 0\nv 1 0 0\n").unwrap();

        let result = pollster::block_on(load_model_data(&path, &mut |_| {}));
        assert!(matches!(result, Err(LoadError::EmptyModel(_))));

        std::fs::remove_dir_all(&dir).ok();
    }

    #[test]
    fn loader_reports_errors_through_poll() {
        let loader = ModelLoader::spawn(PathBuf::from("does/not/exist.obj"));
        assert_eq!(loader.path(), Path::new("does/not/exist.obj"));

        let deadline = Instant::now() + Duration::from_secs(5);
        let result = loop {
            if let Some(result) = loader.poll() {
                break result;
            }
            assert!(Instant::now() < deadline, "loader never finished");
            thread::sleep(Duration::from_millis(10));
        };
        assert!(matches!(result, Err(LoadError::Io { .. })));
    }
}
