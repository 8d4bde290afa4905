//! Whitespace-delimited scene description.
//!
//! ```text
//! v <N> (<x y z r g b u v>){N} <M> (<i0 i1 i2>){M}   vertex set of N vertices and M triangles
//! mh <set> <texture> <x y z speed sx sy sz>          humanoid entity
//! mc <set> <texture> <x y z speed sx sy sz>          vehicle entity
//! c <x y z>                                          camera eye
//! ```
//!
//! Line breaks carry no meaning. A negative texture index draws vertex colors only.

use std::str::FromStr;
use glam::{Vec2, Vec3};
use thiserror::Error;
use crate::renderer::resources::geometry::VertexSet;
use crate::renderer::shader_data::Vertex;
use crate::scene::entity::{Entity, EntityKind};
use crate::scene::Scene;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum SceneError {
    #[error("unexpected end of scene while reading {expected}")]
    UnexpectedEof { expected: &'static str },
    #[error("{line}:{column}: expected {expected}, found '{token}'")]
    InvalidNumber {
        token: String,
        expected: &'static str,
        line: usize,
        column: usize,
    },
    #[error("{line}:{column}: unknown directive '{directive}'")]
    UnknownDirective {
        directive: String,
        line: usize,
        column: usize,
    },
    #[error("{line}:{column}: index {index} is out of range for a vertex set of {vertex_count} vertices")]
    IndexOutOfRange {
        index: u32,
        vertex_count: usize,
        line: usize,
        column: usize,
    },
    #[error("{line}:{column}: entity references vertex set {index} but only {available} are defined")]
    MissingGeometry {
        index: usize,
        available: usize,
        line: usize,
        column: usize,
    },
    #[error("{line}:{column}: {expected} {count} is too large")]
    CountTooLarge {
        count: usize,
        expected: &'static str,
        line: usize,
        column: usize,
    },
}

struct Token<'a> {
    text: &'a str,
    line: usize,
    column: usize,
}

struct Tokenizer<'a> {
    tokens: std::vec::IntoIter<Token<'a>>,
}

impl<'a> Tokenizer<'a> {
    fn new(source: &'a str) -> Self {
        let mut tokens = Vec::new();
        for (line_index, line) in source.lines().enumerate() {
            let mut rest = line;
            let mut consumed = 0;
            while let Some(start) = rest.find(|c: char| !c.is_whitespace()) {
                let after = &rest[start..];
                let len = after.find(char::is_whitespace).unwrap_or(after.len());
                tokens.push(Token {
                    text: &after[..len],
                    line: line_index + 1,
                    column: line[..consumed + start].chars().count() + 1,
                });
                consumed += start + len;
                rest = &after[len..];
            }
        }
        Self { tokens: tokens.into_iter() }
    }

    fn next_token(&mut self) -> Option<Token<'a>> {
        self.tokens.next()
    }

    fn expect(&mut self, expected: &'static str) -> Result<Token<'a>, SceneError> {
        self.next_token().ok_or(SceneError::UnexpectedEof { expected })
    }

    fn parse<T: FromStr>(&mut self, expected: &'static str) -> Result<T, SceneError> {
        let token = self.expect(expected)?;
        token.text.parse().map_err(|_| SceneError::InvalidNumber {
            token: token.text.to_owned(),
            expected,
            line: token.line,
            column: token.column,
        })
    }

    /// Reads an item count and returns it with the number of tokens those items span.
    /// The count is only trusted for preallocation up to what the input can still hold.
    fn count(
        &mut self,
        expected: &'static str,
        tokens_per_item: usize,
    ) -> Result<(usize, usize, usize), SceneError> {
        let token = self.expect(expected)?;
        let count: usize = token.text.parse().map_err(|_| SceneError::InvalidNumber {
            token: token.text.to_owned(),
            expected,
            line: token.line,
            column: token.column,
        })?;
        let total = count
            .checked_mul(tokens_per_item)
            .ok_or(SceneError::CountTooLarge {
                count,
                expected,
                line: token.line,
                column: token.column,
            })?;
        let capacity = count.min(self.tokens.len() / tokens_per_item);
        Ok((count, total, capacity))
    }

    fn vec3(&mut self, expected: &'static str) -> Result<Vec3, SceneError> {
        Ok(Vec3::new(
            self.parse(expected)?,
            self.parse(expected)?,
            self.parse(expected)?,
        ))
    }
}

pub fn parse(source: &str) -> Result<Scene, SceneError> {
    let mut tokens = Tokenizer::new(source);
    let mut scene = Scene::default();

    while let Some(directive) = tokens.next_token() {
        match directive.text {
            "v" => scene.vertex_sets.push(parse_vertex_set(&mut tokens)?),
            "mh" => scene.entities.push(parse_entity(
                &mut tokens,
                EntityKind::Humanoid,
                &directive,
                scene.vertex_sets.len(),
            )?),
            "mc" => scene.entities.push(parse_entity(
                &mut tokens,
                EntityKind::Vehicle,
                &directive,
                scene.vertex_sets.len(),
            )?),
            "c" => scene.camera_eye = Some(tokens.vec3("camera coordinate")?),
            other => {
                return Err(SceneError::UnknownDirective {
                    directive: other.to_owned(),
                    line: directive.line,
                    column: directive.column,
                });
            }
        }
    }

    Ok(scene)
}

fn parse_vertex_set(tokens: &mut Tokenizer) -> Result<VertexSet, SceneError> {
    let (vertex_count, _, capacity) = tokens.count("vertex count", 8)?;
    let mut vertices = Vec::with_capacity(capacity);
    for _ in 0..vertex_count {
        let position = tokens.vec3("vertex position")?;
        let color = tokens.vec3("vertex color")?;
        let uv = Vec2::new(tokens.parse("texture coordinate")?, tokens.parse("texture coordinate")?);
        vertices.push(Vertex { position, color, uv });
    }

    let (_, index_count, capacity) = tokens.count("triangle count", 3)?;
    let mut indices = Vec::with_capacity(capacity * 3);
    for _ in 0..index_count {
        let token = tokens.expect("vertex index")?;
        let index: u32 = token.text.parse().map_err(|_| SceneError::InvalidNumber {
            token: token.text.to_owned(),
            expected: "vertex index",
            line: token.line,
            column: token.column,
        })?;
        if index as usize >= vertex_count {
            return Err(SceneError::IndexOutOfRange {
                index,
                vertex_count,
                line: token.line,
                column: token.column,
            });
        }
        indices.push(index);
    }

    Ok(VertexSet { vertices, indices })
}

fn parse_entity(
    tokens: &mut Tokenizer,
    kind: EntityKind,
    directive: &Token,
    available: usize,
) -> Result<Entity, SceneError> {
    let geometry: usize = tokens.parse("vertex set index")?;
    if geometry >= available {
        return Err(SceneError::MissingGeometry {
            index: geometry,
            available,
            line: directive.line,
            column: directive.column,
        });
    }
    let texture: i64 = tokens.parse("texture index")?;
    let position = tokens.vec3("entity position")?;
    let speed: f32 = tokens.parse("entity speed")?;
    let scale = tokens.vec3("entity scale")?;

    Ok(Entity {
        kind,
        geometry,
        texture: usize::try_from(texture).ok(),
        position,
        speed,
        scale,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn triangle_and_camera() {
        let source = "v 3 0 0 0 1 0 0 0 0  0 1 0 0 1 0 0 1  1 1 0 0 0 1 1 1\n1\n0 1 2\nc 1 2 3\n";
        let scene = parse(source).unwrap();

        assert_eq!(scene.vertex_sets.len(), 1);
        let set = &scene.vertex_sets[0];
        assert_eq!(set.vertices.len(), 3);
        assert_eq!(set.indices, vec![0, 1, 2]);
        assert_eq!(set.vertices[1].position, Vec3::new(0.0, 1.0, 0.0));
        assert_eq!(set.vertices[1].color, Vec3::new(0.0, 1.0, 0.0));
        assert_eq!(set.vertices[2].uv, Vec2::new(1.0, 1.0));
        assert_eq!(scene.camera_eye, Some(Vec3::new(1.0, 2.0, 3.0)));
        assert!(scene.entities.is_empty());
    }

    #[test]
    fn entities_reference_earlier_vertex_sets() {
        let source = "\
            v 3 0 0 0 1 0 0 0 0 0 1 0 0 1 0 0 1 1 1 0 0 0 1 1 1 1 0 1 2\n\
            mh 0 1 0.5 0 0 2 1 1 1\n\
            mc 0 -1 0 0 0 1 0.5 0.5 0.5\n";
        let scene = parse(source).unwrap();

        assert_eq!(scene.entities.len(), 2);
        let human = &scene.entities[0];
        assert_eq!(human.kind, EntityKind::Humanoid);
        assert_eq!(human.texture, Some(1));
        assert_eq!(human.position, Vec3::new(0.5, 0.0, 0.0));
        assert_eq!(human.speed, 2.0);
        let car = &scene.entities[1];
        assert_eq!(car.kind, EntityKind::Vehicle);
        assert_eq!(car.texture, None);
        assert_eq!(car.scale, Vec3::splat(0.5));
    }

    #[test]
    fn reports_position_of_bad_number() {
        let err = parse("c 1 2\n  x\n").unwrap_err();
        assert_eq!(
            err,
            SceneError::InvalidNumber {
                token: "x".to_owned(),
                expected: "camera coordinate",
                line: 2,
                column: 3,
            }
        );
    }

    #[test]
    fn truncated_input_is_fatal() {
        let err = parse("v 3 0 0 0").unwrap_err();
        assert!(matches!(err, SceneError::UnexpectedEof { expected: "vertex color" }));
    }

    #[test]
    fn huge_vertex_count_is_an_error_not_a_panic() {
        let err = parse("v 18446744073709551615 0 0 0").unwrap_err();
        assert!(matches!(err, SceneError::CountTooLarge { expected: "vertex count", line: 1, column: 3, .. }));

        // Fits in usize but not in the input; fails at the end instead of reserving it all
        let err = parse("v 4000000000000 0 0 0").unwrap_err();
        assert!(matches!(err, SceneError::UnexpectedEof { .. }));
    }

    #[test]
    fn huge_triangle_count_is_an_error_not_a_panic() {
        let err = parse("v 1 0 0 0 0 0 0 0 0 6148914691236517206 0 0 0").unwrap_err();
        assert!(matches!(err, SceneError::CountTooLarge { expected: "triangle count", .. }));
    }

    #[test]
    fn columns_count_characters() {
        // The ideographic space is one character but three bytes
        let err = parse("c 1 2\u{3000}x").unwrap_err();
        assert!(matches!(err, SceneError::InvalidNumber { line: 1, column: 7, .. }));
    }

    #[test]
    fn unknown_directive_is_fatal() {
        let err = parse("c 0 0 1\nq 1\n").unwrap_err();
        assert!(matches!(err, SceneError::UnknownDirective { line: 2, column: 1, .. }));
    }

    #[test]
    fn out_of_range_index_is_fatal() {
        let err = parse("v 1 0 0 0 1 1 1 0 0 1 0 0 1").unwrap_err();
        assert!(matches!(err, SceneError::IndexOutOfRange { index: 1, vertex_count: 1, .. }));
    }

    #[test]
    fn entity_before_its_geometry_is_fatal() {
        let err = parse("mh 0 0 0 0 0 1 1 1 1").unwrap_err();
        assert!(matches!(err, SceneError::MissingGeometry { index: 0, available: 0, .. }));
    }
}
