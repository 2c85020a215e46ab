//! In-memory event signup registry.
//!
//! Nothing here is persisted; a restart clears all events.

use std::collections::BTreeMap;

use crate::{
    domain::UserId,
    messaging::types::{InlineButton, InlineKeyboard},
    render::escape_html,
    Error, Result,
};

const NOBODY: &str = "無人報名";

#[derive(Clone, Debug)]
pub struct Participant {
    pub user_id: UserId,
    pub display: String,
}

impl PartialEq for Participant {
    fn eq(&self, other: &Self) -> bool {
        self.user_id == other.user_id
    }
}

impl Eq for Participant {}

#[derive(Clone, Debug)]
pub struct Event {
    pub id: u64,
    pub name: String,
    pub date: String,
    pub time: String,
    pub creator: Participant,
    pub participants: Vec<Participant>,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum JoinOutcome {
    Joined,
    AlreadyJoined,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum LeaveOutcome {
    Left,
    NotJoined,
}

#[derive(Debug)]
pub struct EventRegistry {
    events: BTreeMap<u64, Event>,
    next_id: u64,
}

impl Default for EventRegistry {
    fn default() -> Self {
        Self {
            events: BTreeMap::new(),
            next_id: 1,
        }
    }
}

impl EventRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Ids are sequential and never reused, even after a delete.
    pub fn create(
        &mut self,
        name: impl Into<String>,
        date: impl Into<String>,
        time: impl Into<String>,
        creator: Participant,
    ) -> Event {
        let id = self.next_id;
        self.next_id += 1;
        let event = Event {
            id,
            name: name.into(),
            date: date.into(),
            time: time.into(),
            creator,
            participants: Vec::new(),
        };
        self.events.insert(id, event.clone());
        event
    }

    pub fn get(&self, id: u64) -> Result<&Event> {
        self.events.get(&id).ok_or_else(|| not_found(id))
    }

    pub fn delete(&mut self, id: u64) -> Result<Event> {
        self.events.remove(&id).ok_or_else(|| not_found(id))
    }

    pub fn list(&self) -> Vec<&Event> {
        self.events.values().collect()
    }

    pub fn join(&mut self, id: u64, who: Participant) -> Result<JoinOutcome> {
        let event = self.events.get_mut(&id).ok_or_else(|| not_found(id))?;
        if event.participants.contains(&who) {
            return Ok(JoinOutcome::AlreadyJoined);
        }
        event.participants.push(who);
        Ok(JoinOutcome::Joined)
    }

    pub fn leave(&mut self, id: u64, who: &Participant) -> Result<LeaveOutcome> {
        let event = self.events.get_mut(&id).ok_or_else(|| not_found(id))?;
        let before = event.participants.len();
        event.participants.retain(|p| p != who);
        if event.participants.len() == before {
            return Ok(LeaveOutcome::NotJoined);
        }
        Ok(LeaveOutcome::Left)
    }
}

fn not_found(id: u64) -> Error {
    Error::NotFound(format!("event {id}"))
}

// ============== Rendering ==============

fn participant_list(event: &Event) -> String {
    if event.participants.is_empty() {
        return NOBODY.to_string();
    }
    event
        .participants
        .iter()
        .map(|p| escape_html(&p.display))
        .collect::<Vec<_>>()
        .join(", ")
}

pub fn render_event_card(event: &Event) -> String {
    format!(
        "🎉 <b>活動：{}</b>\n\n<b>活動ID：{}</b>\n日期：{}\n時間：{}\n發起者：{}\n<b>目前參與者</b>：{}",
        escape_html(&event.name),
        event.id,
        escape_html(&event.date),
        escape_html(&event.time),
        escape_html(&event.creator.display),
        participant_list(event)
    )
}

pub fn render_event_list(events: &[&Event]) -> String {
    if events.is_empty() {
        return "目前沒有任何活動！".to_string();
    }
    let body = events
        .iter()
        .map(|e| {
            format!(
                "<b>ID: {}</b> | 名稱: {} | 日期: {} | 時間: {} | 目前報名者：{}",
                e.id,
                escape_html(&e.name),
                escape_html(&e.date),
                escape_html(&e.time),
                participant_list(e)
            )
        })
        .collect::<Vec<_>>()
        .join("\n");
    format!("目前活動列表：\n{body}")
}

// ============== Buttons ==============

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum EventAction {
    Join(u64),
    Leave(u64),
}

pub fn event_keyboard(event_id: u64) -> InlineKeyboard {
    InlineKeyboard::new(vec![
        InlineButton {
            label: "報名參加".to_string(),
            callback_data: format!("event:join:{event_id}"),
        },
        InlineButton {
            label: "取消報名".to_string(),
            callback_data: format!("event:leave:{event_id}"),
        },
    ])
}

/// Parse `event:{join|leave}:{id}` callback data.
pub fn parse_event_callback(data: &str) -> Option<EventAction> {
    let mut parts = data.split(':');
    if parts.next()? != "event" {
        return None;
    }
    let action = parts.next()?;
    let id = parts.next()?.parse::<u64>().ok()?;
    if parts.next().is_some() {
        return None;
    }
    match action {
        "join" => Some(EventAction::Join(id)),
        "leave" => Some(EventAction::Leave(id)),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn who(id: i64, name: &str) -> Participant {
        Participant {
            user_id: UserId(id),
            display: name.to_string(),
        }
    }

    #[test]
    fn ids_are_sequential_and_not_reused() {
        let mut reg = EventRegistry::new();
        let a = reg.create("團建", "2024/12/10", "18:30", who(1, "@amy"));
        let b = reg.create("讀書會", "2024/12/11", "19:00", who(1, "@amy"));
        assert_eq!((a.id, b.id), (1, 2));

        reg.delete(2).unwrap();
        let c = reg.create("球賽", "2024/12/12", "20:00", who(2, "@bo"));
        assert_eq!(c.id, 3);
        assert_eq!(reg.list().iter().map(|e| e.id).collect::<Vec<_>>(), vec![1, 3]);
    }

    #[test]
    fn join_and_leave_by_identity() {
        let mut reg = EventRegistry::new();
        let ev = reg.create("團建", "2024/12/10", "18:30", who(1, "@amy"));

        assert_eq!(reg.join(ev.id, who(7, "@cy")).unwrap(), JoinOutcome::Joined);
        // Same user, different display name.
        assert_eq!(
            reg.join(ev.id, who(7, "Cy Chen")).unwrap(),
            JoinOutcome::AlreadyJoined
        );
        assert_eq!(reg.get(ev.id).unwrap().participants.len(), 1);

        assert_eq!(reg.leave(ev.id, &who(7, "")).unwrap(), LeaveOutcome::Left);
        assert_eq!(
            reg.leave(ev.id, &who(7, "")).unwrap(),
            LeaveOutcome::NotJoined
        );
    }

    #[test]
    fn unknown_ids_are_not_found() {
        let mut reg = EventRegistry::new();
        assert!(matches!(reg.delete(9), Err(Error::NotFound(_))));
        assert!(matches!(reg.join(9, who(1, "a")), Err(Error::NotFound(_))));
        assert!(matches!(reg.leave(9, &who(1, "a")), Err(Error::NotFound(_))));
        assert!(reg.get(9).is_err());
    }

    #[test]
    fn card_shows_participants() {
        let mut reg = EventRegistry::new();
        let ev = reg.create("<團建>", "2024/12/10", "18:30", who(1, "@amy"));
        assert!(render_event_card(&ev).contains("無人報名"));
        assert!(render_event_card(&ev).contains("&lt;團建&gt;"));

        reg.join(ev.id, who(2, "@bo")).unwrap();
        reg.join(ev.id, who(3, "@cy")).unwrap();
        let card = render_event_card(reg.get(ev.id).unwrap());
        assert!(card.contains("<b>目前參與者</b>：@bo, @cy"));
    }

    #[test]
    fn list_rendering() {
        let mut reg = EventRegistry::new();
        assert_eq!(render_event_list(&reg.list()), "目前沒有任何活動！");
        reg.create("團建", "2024/12/10", "18:30", who(1, "@amy"));
        let txt = render_event_list(&reg.list());
        assert!(txt.starts_with("目前活動列表：\n<b>ID: 1</b> | 名稱: 團建"));
    }

    #[test]
    fn long_event_list_never_splits_an_event() {
        let mut reg = EventRegistry::new();
        for i in 0..60 {
            let ev = reg.create(format!("活動{i}"), "2024/12/10", "18:30", who(1, "@amy"));
            for u in 0..5 {
                reg.join(ev.id, who(100 + u, &format!("@member{u}"))).unwrap();
            }
        }
        let txt = render_event_list(&reg.list());
        let chunks = crate::chunking::split_message(&txt, 500);

        assert!(chunks.len() > 1);
        for chunk in &chunks {
            for line in chunk.lines().filter(|l| l.starts_with("<b>ID:")) {
                assert!(line.ends_with("@member4"), "{line}");
            }
            assert!(chunk.lines().all(|l| l.starts_with("<b>ID:") || l == "目前活動列表："));
        }
    }

    #[test]
    fn callback_data_roundtrips_through_keyboard() {
        let kb = event_keyboard(12);
        assert_eq!(
            parse_event_callback(&kb.buttons[0].callback_data),
            Some(EventAction::Join(12))
        );
        assert_eq!(
            parse_event_callback(&kb.buttons[1].callback_data),
            Some(EventAction::Leave(12))
        );
    }

    #[test]
    fn rejects_foreign_callback_data() {
        assert_eq!(parse_event_callback("askuser:1:2"), None);
        assert_eq!(parse_event_callback("event:join:x"), None);
        assert_eq!(parse_event_callback("event:join:1:2"), None);
        assert_eq!(parse_event_callback("event:poke:1"), None);
    }
}
