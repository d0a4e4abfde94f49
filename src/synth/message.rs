use arrayvec::ArrayVec;

/// Most triggers one node can emit inside a single block.
pub const MAX_TRIGGERS: usize = 256;

#[derive(Debug, Copy, Clone, PartialEq)]
pub enum SynthMessage {
    NoteOn { pitch: u8, velocity: f32 },
    NoteOff { pitch: u8 },
    AllNotesOff,
}

/// A message stamped with its frame offset inside the current block.
#[derive(Debug, Copy, Clone, PartialEq)]
pub struct Trigger {
    pub offset: u32,
    pub message: SynthMessage,
}

impl Trigger {
    pub fn note_on(offset: u32, pitch: u8, velocity: f32) -> Self {
        Self {
            offset,
            message: SynthMessage::NoteOn { pitch, velocity },
        }
    }

    pub fn note_off(offset: u32, pitch: u8) -> Self {
        Self {
            offset,
            message: SynthMessage::NoteOff { pitch },
        }
    }
}

/// Fixed-capacity trigger list, reused every block.
pub type TriggerBuffer = ArrayVec<Trigger, MAX_TRIGGERS>;

/// Push unless full. Overflow drops the trigger and trips in debug builds.
#[inline]
pub fn push_trigger(buffer: &mut TriggerBuffer, trigger: Trigger) {
    debug_assert!(!buffer.is_full(), "trigger buffer overflow");
    let _ = buffer.try_push(trigger);
}
