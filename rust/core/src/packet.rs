//! Packet model and fixed-layout binary codec
//!
//! Every packet in the ring is a 5-byte header followed by a payload whose
//! length is fixed by its kind. All fields are little-endian and densely
//! packed so both processes agree byte for byte.
//!
//! Layout of a frame:
//! 0:     Kind (1 byte)
//! 1-4:   Payload size (4 bytes)
//! 5+:    Payload

use crate::error::{DecodeError, DecodeResult};
use bytes::{Buf, BufMut, Bytes, BytesMut};

/// Capacity of the label field of a text command, NUL terminator included
pub const LABEL_CAPACITY: usize = 128;

/// Longest label that survives encoding
pub const MAX_LABEL_LEN: usize = LABEL_CAPACITY - 1;

/// Size of the shape body inside a draw command (the largest variant, text)
pub const SHAPE_BODY_SIZE: usize = Vec3::SIZE + 1 + LABEL_CAPACITY;

/// Packet kinds (1 byte)
#[repr(u8)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PacketKind {
    WorldUpdate = 0,
    DrawCommand = 1,
    ClearAllDrawings = 2,
}

impl PacketKind {
    /// Exact payload size carried by this kind
    pub const fn payload_size(self) -> usize {
        match self {
            PacketKind::WorldUpdate => WorldUpdate::SIZE,
            PacketKind::DrawCommand => DrawCommand::SIZE,
            PacketKind::ClearAllDrawings => 0,
        }
    }
}

impl TryFrom<u8> for PacketKind {
    type Error = DecodeError;

    fn try_from(value: u8) -> DecodeResult<Self> {
        match value {
            0 => Ok(PacketKind::WorldUpdate),
            1 => Ok(PacketKind::DrawCommand),
            2 => Ok(PacketKind::ClearAllDrawings),
            other => Err(DecodeError::UnknownKind(other)),
        }
    }
}

/// Header preceding every payload in the ring.
///
/// `kind` stays raw so an unknown kind can still be skipped by its size.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PacketHeader {
    pub kind: u8,
    pub payload_size: u32,
}

impl PacketHeader {
    /// Encoded header size
    pub const SIZE: usize = 5;

    pub fn new(kind: PacketKind, payload_size: u32) -> Self {
        Self {
            kind: kind as u8,
            payload_size,
        }
    }

    /// Header plus payload
    pub fn frame_len(&self) -> usize {
        Self::SIZE + self.payload_size as usize
    }

    pub fn to_bytes(&self) -> [u8; Self::SIZE] {
        let mut bytes = [0u8; Self::SIZE];
        bytes[0] = self.kind;
        bytes[1..].copy_from_slice(&self.payload_size.to_le_bytes());
        bytes
    }

    pub fn from_bytes(bytes: [u8; Self::SIZE]) -> Self {
        let mut buf = &bytes[..];
        Self {
            kind: buf.get_u8(),
            payload_size: buf.get_u32_le(),
        }
    }
}

/// World-space vector (12 bytes)
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct Vec3 {
    pub x: f32,
    pub y: f32,
    pub z: f32,
}

impl Vec3 {
    pub const SIZE: usize = 12;

    pub const fn new(x: f32, y: f32, z: f32) -> Self {
        Self { x, y, z }
    }

    fn put(&self, buf: &mut BytesMut) {
        buf.put_f32_le(self.x);
        buf.put_f32_le(self.y);
        buf.put_f32_le(self.z);
    }

    fn get(buf: &mut &[u8]) -> Self {
        Self {
            x: buf.get_f32_le(),
            y: buf.get_f32_le(),
            z: buf.get_f32_le(),
        }
    }
}

/// RGBA color (4 bytes)
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Color {
    pub r: u8,
    pub g: u8,
    pub b: u8,
    pub a: u8,
}

impl Color {
    pub const SIZE: usize = 4;

    pub const fn rgba(r: u8, g: u8, b: u8, a: u8) -> Self {
        Self { r, g, b, a }
    }
}

/// View orientation in degrees, as reported by the producer
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct ViewAngles {
    pub pitch: f32,
    pub yaw: f32,
    pub roll: f32,
}

/// Camera state and authoritative clock of the producer (28 bytes)
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct WorldUpdate {
    pub view_angles: ViewAngles,
    pub origin: Vec3,
    pub curtime: f32,
}

impl WorldUpdate {
    pub const SIZE: usize = Vec3::SIZE * 2 + 4;

    fn put(&self, buf: &mut BytesMut) {
        buf.put_f32_le(self.view_angles.pitch);
        buf.put_f32_le(self.view_angles.yaw);
        buf.put_f32_le(self.view_angles.roll);
        self.origin.put(buf);
        buf.put_f32_le(self.curtime);
    }

    fn get(mut buf: &[u8]) -> Self {
        let view_angles = ViewAngles {
            pitch: buf.get_f32_le(),
            yaw: buf.get_f32_le(),
            roll: buf.get_f32_le(),
        };
        let origin = Vec3::get(&mut buf);
        Self {
            view_angles,
            origin,
            curtime: buf.get_f32_le(),
        }
    }
}

/// Geometry of a draw command
#[derive(Debug, Clone, PartialEq)]
pub enum Shape {
    Line {
        start: Vec3,
        end: Vec3,
    },
    Triangle {
        a: Vec3,
        b: Vec3,
        c: Vec3,
    },
    Sphere {
        center: Vec3,
        radius: f32,
    },
    Circle {
        center: Vec3,
        x_axis: Vec3,
        y_axis: Vec3,
        radius: f32,
    },
    /// Axis-aligned box
    Box {
        mins: Vec3,
        maxs: Vec3,
    },
    /// Text label, either pinned to screen coordinates or anchored in the world
    Text {
        position: Vec3,
        screen_space: bool,
        label: String,
    },
}

impl Shape {
    const LINE: u8 = 0;
    const TRIANGLE: u8 = 1;
    const SPHERE: u8 = 2;
    const CIRCLE: u8 = 3;
    const BOX: u8 = 4;
    const TEXT: u8 = 5;

    /// Wire tag of this variant
    pub fn tag(&self) -> u8 {
        match self {
            Shape::Line { .. } => Self::LINE,
            Shape::Triangle { .. } => Self::TRIANGLE,
            Shape::Sphere { .. } => Self::SPHERE,
            Shape::Circle { .. } => Self::CIRCLE,
            Shape::Box { .. } => Self::BOX,
            Shape::Text { .. } => Self::TEXT,
        }
    }

    /// Builds a text shape, truncating the label to what the wire can carry.
    pub fn text(position: Vec3, screen_space: bool, label: &str) -> Self {
        Shape::Text {
            position,
            screen_space,
            label: truncate_label(label).to_owned(),
        }
    }

    fn put_body(&self, buf: &mut BytesMut) {
        let body_start = buf.len();
        match self {
            Shape::Line { start, end } => {
                start.put(buf);
                end.put(buf);
            }
            Shape::Triangle { a, b, c } => {
                a.put(buf);
                b.put(buf);
                c.put(buf);
            }
            Shape::Sphere { center, radius } => {
                center.put(buf);
                buf.put_f32_le(*radius);
            }
            Shape::Circle {
                center,
                x_axis,
                y_axis,
                radius,
            } => {
                center.put(buf);
                x_axis.put(buf);
                y_axis.put(buf);
                buf.put_f32_le(*radius);
            }
            Shape::Box { mins, maxs } => {
                mins.put(buf);
                maxs.put(buf);
            }
            Shape::Text {
                position,
                screen_space,
                label,
            } => {
                position.put(buf);
                buf.put_u8(u8::from(*screen_space));
                let label = truncate_label(label).as_bytes();
                buf.put_slice(label);
                buf.put_bytes(0, LABEL_CAPACITY - label.len());
            }
        }
        let written = buf.len() - body_start;
        buf.put_bytes(0, SHAPE_BODY_SIZE - written);
    }

    fn get_body(tag: u8, mut buf: &[u8]) -> DecodeResult<Self> {
        let shape = match tag {
            Self::LINE => Shape::Line {
                start: Vec3::get(&mut buf),
                end: Vec3::get(&mut buf),
            },
            Self::TRIANGLE => Shape::Triangle {
                a: Vec3::get(&mut buf),
                b: Vec3::get(&mut buf),
                c: Vec3::get(&mut buf),
            },
            Self::SPHERE => Shape::Sphere {
                center: Vec3::get(&mut buf),
                radius: buf.get_f32_le(),
            },
            Self::CIRCLE => Shape::Circle {
                center: Vec3::get(&mut buf),
                x_axis: Vec3::get(&mut buf),
                y_axis: Vec3::get(&mut buf),
                radius: buf.get_f32_le(),
            },
            Self::BOX => Shape::Box {
                mins: Vec3::get(&mut buf),
                maxs: Vec3::get(&mut buf),
            },
            Self::TEXT => {
                let position = Vec3::get(&mut buf);
                let screen_space = buf.get_u8() != 0;
                let raw = &buf[..LABEL_CAPACITY];
                let end = raw.iter().position(|&b| b == 0).unwrap_or(LABEL_CAPACITY);
                Shape::Text {
                    position,
                    screen_space,
                    label: String::from_utf8_lossy(&raw[..end]).into_owned(),
                }
            }
            other => return Err(DecodeError::UnknownShape(other)),
        };
        Ok(shape)
    }
}

/// Cuts a label at its first NUL and to at most [`MAX_LABEL_LEN`] bytes,
/// never splitting a UTF-8 sequence.
pub fn truncate_label(label: &str) -> &str {
    let label = label.split('\0').next().unwrap_or_default();
    if label.len() <= MAX_LABEL_LEN {
        return label;
    }
    let mut end = MAX_LABEL_LEN;
    while !label.is_char_boundary(end) {
        end -= 1;
    }
    &label[..end]
}

/// A transient drawing command (150 bytes on the wire)
#[derive(Debug, Clone, PartialEq)]
pub struct DrawCommand {
    pub color: Color,
    /// Expiry in the producer's clock domain; `<= 0` means one tick
    pub draw_end_time: f32,
    pub shape: Shape,
}

impl DrawCommand {
    pub const SIZE: usize = 1 + Color::SIZE + 4 + SHAPE_BODY_SIZE;

    pub fn new(color: Color, draw_end_time: f32, shape: Shape) -> Self {
        Self {
            color,
            draw_end_time,
            shape,
        }
    }

    fn put(&self, buf: &mut BytesMut) {
        buf.put_u8(self.shape.tag());
        buf.put_u8(self.color.r);
        buf.put_u8(self.color.g);
        buf.put_u8(self.color.b);
        buf.put_u8(self.color.a);
        buf.put_f32_le(self.draw_end_time);
        self.shape.put_body(buf);
    }

    fn get(mut buf: &[u8]) -> DecodeResult<Self> {
        let tag = buf.get_u8();
        let color = Color {
            r: buf.get_u8(),
            g: buf.get_u8(),
            b: buf.get_u8(),
            a: buf.get_u8(),
        };
        let draw_end_time = buf.get_f32_le();
        let shape = Shape::get_body(tag, buf)?;
        Ok(Self {
            color,
            draw_end_time,
            shape,
        })
    }
}

/// A decoded packet
#[derive(Debug, Clone, PartialEq)]
pub enum Packet {
    WorldUpdate(WorldUpdate),
    DrawCommand(DrawCommand),
    ClearAllDrawings,
}

impl Packet {
    pub fn kind(&self) -> PacketKind {
        match self {
            Packet::WorldUpdate(_) => PacketKind::WorldUpdate,
            Packet::DrawCommand(_) => PacketKind::DrawCommand,
            Packet::ClearAllDrawings => PacketKind::ClearAllDrawings,
        }
    }

    pub fn header(&self) -> PacketHeader {
        let kind = self.kind();
        PacketHeader::new(kind, kind.payload_size() as u32)
    }

    /// Serialize header and payload into one frame
    pub fn encode(&self) -> Bytes {
        let header = self.header();
        let mut buf = BytesMut::with_capacity(header.frame_len());
        buf.put_slice(&header.to_bytes());
        match self {
            Packet::WorldUpdate(update) => update.put(&mut buf),
            Packet::DrawCommand(command) => command.put(&mut buf),
            Packet::ClearAllDrawings => {}
        }
        buf.freeze()
    }

    /// Deserialize a payload of the given kind.
    ///
    /// The payload must be exactly the size of its kind; anything else is a
    /// [`DecodeError::SizeMismatch`] rather than a best-effort parse.
    pub fn decode(kind: PacketKind, payload: &[u8]) -> DecodeResult<Self> {
        let expected = kind.payload_size();
        if payload.len() != expected {
            return Err(DecodeError::SizeMismatch {
                kind,
                expected,
                actual: payload.len(),
            });
        }

        match kind {
            PacketKind::WorldUpdate => Ok(Packet::WorldUpdate(WorldUpdate::get(payload))),
            PacketKind::DrawCommand => Ok(Packet::DrawCommand(DrawCommand::get(payload)?)),
            PacketKind::ClearAllDrawings => Ok(Packet::ClearAllDrawings),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn roundtrip(packet: &Packet) -> Packet {
        let frame = packet.encode();
        let mut head = [0u8; PacketHeader::SIZE];
        head.copy_from_slice(&frame[..PacketHeader::SIZE]);
        let header = PacketHeader::from_bytes(head);
        assert_eq!(header.frame_len(), frame.len());

        let kind = PacketKind::try_from(header.kind).unwrap();
        Packet::decode(kind, &frame[PacketHeader::SIZE..]).unwrap()
    }

    #[test]
    fn test_wire_sizes() {
        assert_eq!(PacketHeader::SIZE, 5);
        assert_eq!(WorldUpdate::SIZE, 28);
        assert_eq!(SHAPE_BODY_SIZE, 141);
        assert_eq!(DrawCommand::SIZE, 150);
        assert_eq!(Packet::ClearAllDrawings.encode().len(), PacketHeader::SIZE);
    }

    #[test]
    fn test_header_layout() {
        let header = PacketHeader::new(PacketKind::DrawCommand, 0x0102_0304);
        assert_eq!(header.to_bytes(), [1, 0x04, 0x03, 0x02, 0x01]);
        assert_eq!(PacketHeader::from_bytes(header.to_bytes()), header);
    }

    #[test]
    fn test_world_update_roundtrip() {
        let packet = Packet::WorldUpdate(WorldUpdate {
            view_angles: ViewAngles {
                pitch: 12.5,
                yaw: -90.0,
                roll: 0.0,
            },
            origin: Vec3::new(100.0, -250.5, 64.0),
            curtime: 37.25,
        });
        assert_eq!(roundtrip(&packet), packet);
    }

    #[test]
    fn test_every_shape_roundtrips() {
        let p = Vec3::new(1.0, 2.0, 3.0);
        let q = Vec3::new(-4.0, 5.5, 6.25);
        let shapes = vec![
            Shape::Line { start: p, end: q },
            Shape::Triangle { a: p, b: q, c: Vec3::default() },
            Shape::Sphere { center: p, radius: 20.0 },
            Shape::Circle {
                center: p,
                x_axis: Vec3::new(1.0, 0.0, 0.0),
                y_axis: Vec3::new(0.0, 1.0, 0.0),
                radius: 8.0,
            },
            Shape::Box { mins: p, maxs: q },
            Shape::text(q, true, "hello"),
            Shape::text(p, false, "héllo wörld"),
        ];

        for shape in shapes {
            let packet = Packet::DrawCommand(DrawCommand::new(
                Color::rgba(255, 0, 128, 200),
                4.5,
                shape,
            ));
            assert_eq!(roundtrip(&packet), packet);
        }
    }

    #[test]
    fn test_label_at_capacity_is_kept() {
        let label = "x".repeat(MAX_LABEL_LEN);
        let packet = Packet::DrawCommand(DrawCommand::new(
            Color::default(),
            0.0,
            Shape::Text {
                position: Vec3::default(),
                screen_space: false,
                label: label.clone(),
            },
        ));
        match roundtrip(&packet) {
            Packet::DrawCommand(DrawCommand {
                shape: Shape::Text { label: decoded, .. },
                ..
            }) => assert_eq!(decoded, label),
            other => panic!("unexpected packet {:?}", other),
        }
    }

    #[test]
    fn test_label_beyond_capacity_is_truncated() {
        for len in [LABEL_CAPACITY, LABEL_CAPACITY + 1, 4 * LABEL_CAPACITY] {
            let label = "y".repeat(len);
            let packet = Packet::DrawCommand(DrawCommand::new(
                Color::default(),
                1.0,
                Shape::Text {
                    position: Vec3::default(),
                    screen_space: true,
                    label,
                },
            ));
            let frame = packet.encode();
            assert_eq!(frame.len(), PacketHeader::SIZE + DrawCommand::SIZE);

            match roundtrip(&packet) {
                Packet::DrawCommand(DrawCommand {
                    shape: Shape::Text { label, .. },
                    ..
                }) => assert_eq!(label, "y".repeat(MAX_LABEL_LEN)),
                other => panic!("unexpected packet {:?}", other),
            }
        }
    }

    #[test]
    fn test_truncate_label_keeps_char_boundaries() {
        // 'é' is two bytes; 64 of them straddle the limit.
        let label = "é".repeat(64);
        let cut = truncate_label(&label);
        assert!(cut.len() <= MAX_LABEL_LEN);
        assert_eq!(cut.len(), 126);
        assert_eq!(truncate_label("ab\0cd"), "ab");
    }

    #[test]
    fn test_size_mismatch_is_rejected() {
        let err = Packet::decode(PacketKind::WorldUpdate, &[0u8; 27]).unwrap_err();
        assert_eq!(
            err,
            DecodeError::SizeMismatch {
                kind: PacketKind::WorldUpdate,
                expected: 28,
                actual: 27,
            }
        );

        let err = Packet::decode(PacketKind::ClearAllDrawings, &[0u8; 1]).unwrap_err();
        assert!(matches!(err, DecodeError::SizeMismatch { .. }));
    }

    #[test]
    fn test_unknown_kind_and_shape() {
        assert_eq!(PacketKind::try_from(3), Err(DecodeError::UnknownKind(3)));

        let mut payload = Packet::DrawCommand(DrawCommand::new(
            Color::default(),
            0.0,
            Shape::Sphere { center: Vec3::default(), radius: 1.0 },
        ))
        .encode()
        .slice(PacketHeader::SIZE..)
        .to_vec();
        payload[0] = 77;
        assert_eq!(
            Packet::decode(PacketKind::DrawCommand, &payload),
            Err(DecodeError::UnknownShape(77))
        );
    }

    #[test]
    fn test_unterminated_label_reads_full_capacity() {
        let mut payload = Packet::DrawCommand(DrawCommand::new(
            Color::default(),
            0.0,
            Shape::text(Vec3::default(), false, ""),
        ))
        .encode()
        .slice(PacketHeader::SIZE..)
        .to_vec();
        let label_start = DrawCommand::SIZE - LABEL_CAPACITY;
        payload[label_start..].fill(b'z');

        match Packet::decode(PacketKind::DrawCommand, &payload).unwrap() {
            Packet::DrawCommand(DrawCommand {
                shape: Shape::Text { label, .. },
                ..
            }) => assert_eq!(label.len(), LABEL_CAPACITY),
            other => panic!("unexpected packet {:?}", other),
        }
    }
}
